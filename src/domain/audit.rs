use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::domain::actor::Actor;

pub const RESOURCE_TRANSACTION: &str = "transaction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateTransaction,
    UpdateTransaction,
    FlagTransaction,
    DeleteTransaction,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateTransaction => "create_transaction",
            AuditAction::UpdateTransaction => "update_transaction",
            AuditAction::FlagTransaction => "flag_transaction",
            AuditAction::DeleteTransaction => "delete_transaction",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one state-changing action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn for_transaction(actor: &Actor, action: AuditAction, transaction: Uuid, details: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(actor.user_id),
            action: action.as_str().to_string(),
            resource_type: RESOURCE_TRANSACTION.to_string(),
            resource_id: transaction,
            details,
            created_at: Utc::now(),
        }
    }
}
