//! Storage ports used by the decision pipeline.
//!
//! Every mutating operation takes the audit entry that documents it; an
//! implementation must persist both together or neither.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Alert, AlertContext, AuditEntry, Transaction, TransactionFilter, TransactionPage,
    TransactionUpdate,
};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return RepositoryError::NotFound("row not found".to_string());
        }
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return RepositoryError::Conflict(db_err.message().to_string());
            }
        }
        RepositoryError::Database(err)
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts or rejects atomically on the business identifier.
    async fn insert(&self, tx: &Transaction, audit: &AuditEntry) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    /// `Ok(None)` when the transaction no longer exists.
    async fn get_alert_context(&self, id: Uuid) -> RepositoryResult<Option<AlertContext>>;

    async fn update(
        &self,
        id: Uuid,
        changes: &TransactionUpdate,
        audit: &AuditEntry,
    ) -> RepositoryResult<Transaction>;

    /// Sets `is_flagged` and `is_fraud` to true.
    async fn mark_fraud(&self, id: Uuid, audit: &AuditEntry) -> RepositoryResult<Transaction>;

    /// Physical delete. Alerts for the transaction go with it.
    async fn delete(&self, id: Uuid, audit: &AuditEntry) -> RepositoryResult<()>;

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<TransactionPage>;

    async fn count(&self) -> RepositoryResult<i64>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert(&self, alert: &Alert) -> RepositoryResult<Alert>;

    async fn list_for_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Vec<Alert>>;

    async fn count_unresolved(&self, transaction_id: Uuid) -> RepositoryResult<i64>;
}

/// Read side of the audit log. Appends happen inside the mutating store calls.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn list_for_resource(&self, resource_id: Uuid) -> RepositoryResult<Vec<AuditEntry>>;
}
