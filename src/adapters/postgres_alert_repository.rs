//! Postgres implementations of AlertRepository and AuditRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Alert, AuditEntry, Severity};
use crate::ports::{AlertRepository, AuditRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresAlertRepository {
    pool: PgPool,
}

impl PostgresAlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for PostgresAlertRepository {
    async fn insert(&self, alert: &Alert) -> RepositoryResult<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO alerts (id, transaction_id, alert_type, severity, message, is_resolved, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, transaction_id, alert_type, severity, message, is_resolved, created_at
            "#,
        )
        .bind(alert.id)
        .bind(alert.transaction_id)
        .bind(&alert.alert_type)
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.is_resolved)
        .bind(alert.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn list_for_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, transaction_id, alert_type, severity, message, is_resolved, created_at
            FROM alerts
            WHERE transaction_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AlertRow::into_domain).collect()
    }

    async fn count_unresolved(&self, transaction_id: Uuid) -> RepositoryResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM alerts WHERE transaction_id = $1 AND is_resolved = false",
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn list_for_resource(&self, resource_id: Uuid) -> RepositoryResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, user_id, action, resource_type, resource_id, details, created_at
            FROM audit_logs
            WHERE resource_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AuditEntry {
                id: r.id,
                user_id: r.user_id,
                action: r.action,
                resource_type: r.resource_type,
                resource_id: r.resource_id,
                details: r.details,
                created_at: r.created_at,
            })
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    transaction_id: Uuid,
    alert_type: String,
    severity: String,
    message: String,
    is_resolved: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl AlertRow {
    fn into_domain(self) -> RepositoryResult<Alert> {
        let severity = self
            .severity
            .parse::<Severity>()
            .map_err(RepositoryError::InvalidRow)?;

        Ok(Alert {
            id: self.id,
            transaction_id: self.transaction_id,
            alert_type: self.alert_type,
            severity,
            message: self.message,
            is_resolved: self.is_resolved,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    resource_type: String,
    resource_id: Uuid,
    details: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
}
