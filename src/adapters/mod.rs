pub mod postgres_alert_repository;
pub mod postgres_transaction_repository;

pub use postgres_alert_repository::{PostgresAlertRepository, PostgresAuditRepository};
pub use postgres_transaction_repository::PostgresTransactionRepository;
