#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use fraud_sentinel::domain::{
    Actor, Alert, AlertContext, AuditEntry, NewTransaction, RiskScore, Role, Transaction,
    TransactionFilter, TransactionPage, TransactionUpdate,
};
use fraud_sentinel::notifications::{AlertDispatcher, EmailMessage, Mailer, NotificationError};
use fraud_sentinel::ports::{
    AlertRepository, AuditRepository, RepositoryError, RepositoryResult, TransactionRepository,
};
use fraud_sentinel::scoring::{FraudPrediction, FraudScorer, ScoreOutcome, ScoringRequest};
use fraud_sentinel::use_cases::DecisionEngine;

#[derive(Default)]
struct State {
    transactions: Vec<Transaction>,
    alerts: Vec<Alert>,
    audit: Vec<AuditEntry>,
    users: HashMap<Uuid, (String, String)>,
    fail_alert_inserts: bool,
}

/// Store honouring the same contract as the Postgres adapters: unique
/// business identifier, audit written with the mutation, alert cascade.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, id: Uuid, email: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(id, (email.to_string(), name.to_string()));
    }

    pub fn fail_alert_inserts(&self, fail: bool) {
        self.state.lock().unwrap().fail_alert_inserts = fail;
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state.lock().unwrap().alerts.clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().unwrap().audit.clone()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn insert(&self, tx: &Transaction, audit: &AuditEntry) -> RepositoryResult<Transaction> {
        let mut state = self.state.lock().unwrap();
        if state
            .transactions
            .iter()
            .any(|t| t.transaction_id == tx.transaction_id)
        {
            return Err(RepositoryError::Conflict(tx.transaction_id.clone()));
        }
        state.transactions.push(tx.clone());
        state.audit.push(audit.clone());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let state = self.state.lock().unwrap();
        state
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_alert_context(&self, id: Uuid) -> RepositoryResult<Option<AlertContext>> {
        let state = self.state.lock().unwrap();
        Ok(state.transactions.iter().find(|t| t.id == id).map(|t| {
            let user = t.user_id.and_then(|uid| state.users.get(&uid)).cloned();
            AlertContext {
                transaction: t.clone(),
                submitter_email: user.as_ref().map(|(email, _)| email.clone()),
                submitter_name: user.map(|(_, name)| name),
            }
        }))
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &TransactionUpdate,
        audit: &AuditEntry,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.lock().unwrap();
        let tx = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        changes.apply_to(tx);
        let updated = tx.clone();
        state.audit.push(audit.clone());
        Ok(updated)
    }

    async fn mark_fraud(&self, id: Uuid, audit: &AuditEntry) -> RepositoryResult<Transaction> {
        let mut state = self.state.lock().unwrap();
        let tx = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        tx.is_flagged = true;
        tx.is_fraud = true;
        tx.updated_at = Utc::now();
        let updated = tx.clone();
        state.audit.push(audit.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid, audit: &AuditEntry) -> RepositoryResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.transactions.len();
        state.transactions.retain(|t| t.id != id);
        if state.transactions.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        state.alerts.retain(|a| a.transaction_id != id);
        state.audit.push(audit.clone());
        Ok(())
    }

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<TransactionPage> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let transactions = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();

        Ok(TransactionPage {
            transactions,
            page: filter.page,
            limit: filter.limit,
            total,
        })
    }

    async fn count(&self) -> RepositoryResult<i64> {
        Ok(self.transaction_count() as i64)
    }
}

#[async_trait]
impl AlertRepository for InMemoryStore {
    async fn insert(&self, alert: &Alert) -> RepositoryResult<Alert> {
        let mut state = self.state.lock().unwrap();
        if state.fail_alert_inserts {
            return Err(RepositoryError::InvalidRow("alert store offline".to_string()));
        }
        if !state.transactions.iter().any(|t| t.id == alert.transaction_id) {
            return Err(RepositoryError::NotFound(alert.transaction_id.to_string()));
        }
        state.alerts.push(alert.clone());
        Ok(alert.clone())
    }

    async fn list_for_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Vec<Alert>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .alerts
            .iter()
            .filter(|a| a.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn count_unresolved(&self, transaction_id: Uuid) -> RepositoryResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .alerts
            .iter()
            .filter(|a| a.transaction_id == transaction_id && !a.is_resolved)
            .count() as i64)
    }
}

#[async_trait]
impl AuditRepository for InMemoryStore {
    async fn list_for_resource(&self, resource_id: Uuid) -> RepositoryResult<Vec<AuditEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|e| e.resource_id == resource_id)
            .cloned()
            .collect())
    }
}

/// Scorer returning a fixed prediction and recording what it was asked.
pub struct StubScorer {
    prediction: FraudPrediction,
    requests: Mutex<Vec<ScoringRequest>>,
}

impl StubScorer {
    pub fn new(score: f64, flagged: bool) -> Arc<Self> {
        Arc::new(Self {
            prediction: FraudPrediction {
                fraud_risk_score: RiskScore::new(score).unwrap(),
                is_flagged: flagged,
                reasons: Vec::new(),
            },
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl FraudScorer for StubScorer {
    async fn score(&self, request: &ScoringRequest) -> ScoreOutcome {
        self.requests.lock().unwrap().push(request.clone());
        ScoreOutcome::Scored(self.prediction.clone())
    }
}

/// Mailer capturing messages, optionally failing every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Email("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn dispatcher(store: &Arc<InMemoryStore>) -> AlertDispatcher {
    AlertDispatcher::new(store.clone(), store.clone())
}

pub fn engine_with(
    store: &Arc<InMemoryStore>,
    scorer: Arc<dyn FraudScorer>,
    dispatcher: AlertDispatcher,
) -> DecisionEngine {
    DecisionEngine::new(store.clone(), store.clone(), store.clone(), scorer, dispatcher)
}

pub fn analyst() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Analyst)
}

pub fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Admin)
}

pub fn viewer() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Viewer)
}

pub fn submission(id: &str) -> NewTransaction {
    serde_json::from_value(serde_json::json!({
        "transaction_id": id,
        "amount": 15000,
        "currency": "USD",
        "transaction_type": "purchase",
        "payment_method": "bank_transfer",
        "location_country": "RU"
    }))
    .expect("valid submission")
}
