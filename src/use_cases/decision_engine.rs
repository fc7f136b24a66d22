//! Transaction decision pipeline.
//! Scores a submission, persists it with its audit entry, and dispatches
//! alerts for flagged transactions.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Actor, Alert, AuditAction, AuditEntry, NewTransaction, Transaction, TransactionDetail,
    TransactionFilter, TransactionPage, TransactionUpdate,
};
use crate::error::AppError;
use crate::notifications::{AlertDispatcher, DispatchOutcome};
use crate::ports::{AlertRepository, AuditRepository, TransactionRepository};
use crate::scoring::{FraudScorer, ScoreOutcome, ScoringRequest};
use crate::validation;

pub struct DecisionEngine {
    transactions: Arc<dyn TransactionRepository>,
    alerts: Arc<dyn AlertRepository>,
    audit: Arc<dyn AuditRepository>,
    scorer: Arc<dyn FraudScorer>,
    dispatcher: AlertDispatcher,
}

impl DecisionEngine {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        alerts: Arc<dyn AlertRepository>,
        audit: Arc<dyn AuditRepository>,
        scorer: Arc<dyn FraudScorer>,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            transactions,
            alerts,
            audit,
            scorer,
            dispatcher,
        }
    }

    /// Validates, scores and persists a submission. Dispatches an alert when
    /// the score comes back flagged; dispatch failures never reach the caller.
    pub async fn submit(&self, actor: &Actor, submission: NewTransaction) -> Result<Transaction, AppError> {
        let submission = validation::sanitize_submission(submission);
        validation::validate_submission(&submission)?;

        let request = ScoringRequest::from_submission(&submission, Utc::now());
        let outcome = self.scorer.score(&request).await;
        if let ScoreOutcome::Fallback { cause, .. } = &outcome {
            tracing::warn!(
                transaction = %submission.transaction_id,
                error = %cause,
                "Scoring unavailable, transaction accepted with fallback score"
            );
        }
        let prediction = outcome.into_prediction();

        let tx = Transaction::new(
            submission,
            actor,
            prediction.fraud_risk_score,
            prediction.is_flagged,
        );
        let audit = AuditEntry::for_transaction(
            actor,
            AuditAction::CreateTransaction,
            tx.id,
            json!({
                "transaction_id": tx.transaction_id,
                "fraud_risk_score": tx.fraud_risk_score,
                "is_flagged": tx.is_flagged,
                "reasons": prediction.reasons,
            }),
        );

        let inserted = self.transactions.insert(&tx, &audit).await.map_err(|e| {
            let err = AppError::from(e);
            if let AppError::Conflict(_) = err {
                return AppError::Conflict(format!(
                    "Transaction ID {} already exists",
                    tx.transaction_id
                ));
            }
            err
        })?;

        tracing::info!(
            transaction = %inserted.transaction_id,
            id = %inserted.id,
            score = %inserted.fraud_risk_score,
            flagged = inserted.is_flagged,
            "Transaction recorded"
        );

        if prediction.is_flagged {
            self.dispatch(inserted.id, &inserted.transaction_id).await;
        }

        Ok(inserted)
    }

    /// Applies only the provided fields.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: TransactionUpdate,
    ) -> Result<Transaction, AppError> {
        let changes = TransactionUpdate {
            status: changes.status.map(|s| validation::sanitize_string(&s)),
            is_fraud: changes.is_fraud,
        };
        validation::validate_update(&changes)?;

        let mut details = Map::new();
        if let Some(status) = &changes.status {
            details.insert("status".to_string(), Value::from(status.clone()));
        }
        if let Some(is_fraud) = changes.is_fraud {
            details.insert("is_fraud".to_string(), Value::from(is_fraud));
        }
        let audit = AuditEntry::for_transaction(
            actor,
            AuditAction::UpdateTransaction,
            id,
            Value::Object(details),
        );

        let updated = self
            .transactions
            .update(id, &changes, &audit)
            .await
            .map_err(|e| not_found_as(e, id))?;

        tracing::info!(transaction = %updated.transaction_id, "Transaction updated");
        Ok(updated)
    }

    /// Forces `is_flagged` and `is_fraud` and always dispatches, even when the
    /// transaction was already flagged.
    pub async fn flag(&self, actor: &Actor, id: Uuid) -> Result<Transaction, AppError> {
        if !actor.can_flag() {
            return Err(AppError::Forbidden(
                "flagging requires the admin or analyst role".to_string(),
            ));
        }

        let audit = AuditEntry::for_transaction(
            actor,
            AuditAction::FlagTransaction,
            id,
            json!({ "is_flagged": true, "is_fraud": true }),
        );
        let flagged = self
            .transactions
            .mark_fraud(id, &audit)
            .await
            .map_err(|e| not_found_as(e, id))?;

        tracing::info!(transaction = %flagged.transaction_id, "Transaction flagged as fraud");
        self.dispatch(flagged.id, &flagged.transaction_id).await;

        Ok(flagged)
    }

    /// Unconditional physical delete.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        if !actor.can_delete() {
            return Err(AppError::Forbidden(
                "deleting requires the admin role".to_string(),
            ));
        }

        let existing = self
            .transactions
            .get_by_id(id)
            .await
            .map_err(|e| not_found_as(e, id))?;
        let audit = AuditEntry::for_transaction(
            actor,
            AuditAction::DeleteTransaction,
            id,
            json!({ "transaction_id": existing.transaction_id }),
        );
        self.transactions
            .delete(id, &audit)
            .await
            .map_err(|e| not_found_as(e, id))?;

        tracing::info!(transaction = %existing.transaction_id, "Transaction deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<TransactionDetail, AppError> {
        let transaction = self
            .transactions
            .get_by_id(id)
            .await
            .map_err(|e| not_found_as(e, id))?;
        let alert_count = self.alerts.count_unresolved(id).await?;

        Ok(TransactionDetail {
            transaction,
            alert_count,
        })
    }

    pub async fn list(&self, filter: &TransactionFilter) -> Result<TransactionPage, AppError> {
        validation::validate_filter(filter)?;
        Ok(self.transactions.list(filter).await?)
    }

    pub async fn alerts_for(&self, id: Uuid) -> Result<Vec<Alert>, AppError> {
        Ok(self.alerts.list_for_transaction(id).await?)
    }

    pub async fn audit_trail(&self, id: Uuid) -> Result<Vec<AuditEntry>, AppError> {
        Ok(self.audit.list_for_resource(id).await?)
    }

    async fn dispatch(&self, id: Uuid, business_id: &str) {
        match self.dispatcher.dispatch(id).await {
            DispatchOutcome::Dispatched { email, webhook, .. } => {
                tracing::debug!(
                    transaction = %business_id,
                    email = ?email,
                    webhook = ?webhook,
                    "Fraud alert dispatched"
                );
            }
            DispatchOutcome::TransactionMissing => {
                tracing::warn!(transaction = %business_id, "Fraud alert skipped, transaction missing");
            }
            DispatchOutcome::AlertNotRecorded(reason) => {
                tracing::error!(transaction = %business_id, %reason, "Fraud alert not recorded");
            }
        }
    }
}

fn not_found_as(err: crate::ports::RepositoryError, id: Uuid) -> AppError {
    match AppError::from(err) {
        AppError::NotFound(_) => AppError::NotFound(format!("Transaction {} not found", id)),
        other => other,
    }
}
