//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::audit::AuditLog;
use crate::domain::{
    AlertContext, AuditEntry, RiskScore, Transaction, TransactionFilter, TransactionPage,
    TransactionUpdate,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const TRANSACTION_COLUMNS: &str = "id, transaction_id, user_id, amount, currency, merchant_name, \
    transaction_type, payment_method, card_number_last4, location_country, location_city, \
    ip_address, device_type, fraud_risk_score, is_flagged, is_fraud, status, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction, audit: &AuditEntry) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        // A duplicate transaction_id fails here with 23505 and the rollback on
        // drop discards everything.
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, transaction_id, user_id, amount, currency, merchant_name,
                transaction_type, payment_method, card_number_last4, location_country, location_city,
                ip_address, device_type, fraud_risk_score, is_flagged, is_fraud, status,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(tx.id)
        .bind(&tx.transaction_id)
        .bind(tx.user_id)
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(&tx.merchant_name)
        .bind(&tx.transaction_type)
        .bind(&tx.payment_method)
        .bind(&tx.card_number_last4)
        .bind(&tx.location_country)
        .bind(&tx.location_city)
        .bind(&tx.ip_address)
        .bind(&tx.device_type)
        .bind(tx.fraud_risk_score.value())
        .bind(tx.is_flagged)
        .bind(tx.is_fraud)
        .bind(&tx.status)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&mut *db_tx)
        .await?;

        AuditLog::append(&mut *db_tx, audit).await?;
        db_tx.commit().await?;

        Ok(row.into_domain())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_alert_context(&self, id: Uuid) -> RepositoryResult<Option<AlertContext>> {
        let row = sqlx::query_as::<_, AlertContextRow>(
            r#"
            SELECT t.id, t.transaction_id, t.user_id, t.amount, t.currency, t.merchant_name,
                   t.transaction_type, t.payment_method, t.card_number_last4, t.location_country,
                   t.location_city, t.ip_address, t.device_type, t.fraud_risk_score, t.is_flagged,
                   t.is_fraud, t.status, t.created_at, t.updated_at,
                   u.email AS user_email, u.name AS user_name
            FROM transactions t
            LEFT JOIN users u ON t.user_id = u.id
            WHERE t.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AlertContext {
            transaction: r.transaction.into_domain(),
            submitter_email: r.user_email,
            submitter_name: r.user_name,
        }))
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &TransactionUpdate,
        audit: &AuditEntry,
    ) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = COALESCE($1, status),
                is_fraud = COALESCE($2, is_fraud),
                updated_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(&changes.status)
        .bind(changes.is_fraud)
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        AuditLog::append(&mut *db_tx, audit).await?;
        db_tx.commit().await?;

        Ok(row.into_domain())
    }

    async fn mark_fraud(&self, id: Uuid, audit: &AuditEntry) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET is_flagged = true, is_fraud = true, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        AuditLog::append(&mut *db_tx, audit).await?;
        db_tx.commit().await?;

        Ok(row.into_domain())
    }

    async fn delete(&self, id: Uuid, audit: &AuditEntry) -> RepositoryResult<()> {
        let mut db_tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *db_tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }

        AuditLog::append(&mut *db_tx, audit).await?;
        db_tx.commit().await?;

        Ok(())
    }

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<TransactionPage> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM transactions",
            TRANSACTION_COLUMNS
        ));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let rows = query
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_filters(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok(TransactionPage {
            transactions: rows.into_iter().map(|r| r.into_domain()).collect(),
            page: filter.page,
            limit: filter.limit,
            total,
        })
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    query.push(" WHERE 1=1");
    if let Some(flagged) = filter.is_flagged {
        query.push(" AND is_flagged = ").push_bind(flagged);
    }
    if let Some(min) = filter.min_risk_score {
        query.push(" AND fraud_risk_score >= ").push_bind(min);
    }
    if let Some(start) = filter.start_date {
        query.push(" AND created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        query.push(" AND created_at <= ").push_bind(end);
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_id: String,
    user_id: Option<Uuid>,
    amount: bigdecimal::BigDecimal,
    currency: String,
    merchant_name: Option<String>,
    transaction_type: String,
    payment_method: String,
    card_number_last4: Option<String>,
    location_country: String,
    location_city: Option<String>,
    ip_address: Option<String>,
    device_type: Option<String>,
    fraud_risk_score: f64,
    is_flagged: bool,
    is_fraud: bool,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> Transaction {
        Transaction {
            id: self.id,
            transaction_id: self.transaction_id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            merchant_name: self.merchant_name,
            transaction_type: self.transaction_type,
            payment_method: self.payment_method,
            card_number_last4: self.card_number_last4,
            location_country: self.location_country,
            location_city: self.location_city,
            ip_address: self.ip_address,
            device_type: self.device_type,
            // Guarded by a CHECK constraint.
            fraud_risk_score: RiskScore::saturating(self.fraud_risk_score),
            is_flagged: self.is_flagged,
            is_fraud: self.is_fraud,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AlertContextRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    user_email: Option<String>,
    user_name: Option<String>,
}
