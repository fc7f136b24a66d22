//! Domain entities shared by the decision pipeline and its adapters.

pub mod actor;
pub mod alert;
pub mod audit;
pub mod transaction;

pub use actor::{Actor, Role};
pub use alert::{Alert, Severity};
pub use audit::{AuditAction, AuditEntry};
pub use transaction::{
    AlertContext, NewTransaction, RiskScore, Transaction, TransactionDetail, TransactionFilter,
    TransactionPage, TransactionUpdate,
};
