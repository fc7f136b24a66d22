use sqlx::PgConnection;

use crate::domain::AuditEntry;

/// Append-only writer for `audit_logs`. Always called on the connection of the
/// transaction that performs the documented mutation.
pub struct AuditLog;

impl AuditLog {
    pub async fn append(conn: &mut PgConnection, entry: &AuditEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource_type, resource_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
