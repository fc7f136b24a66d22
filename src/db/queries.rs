//! Reporting queries. Read-only; never used by the decision pipeline.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Result};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_TREND_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_transactions: i64,
    pub flagged_transactions: i64,
    pub total_amount: BigDecimal,
    pub avg_risk_score: f64,
    pub fraud_rate: f64,
    pub recent_alerts: Vec<RecentAlert>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecentAlert {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub business_id: String,
    pub amount: BigDecimal,
    pub severity: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct RiskBucket {
    pub risk_category: String,
    pub count: i64,
}

/// Bucket width of a trend report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendPeriod {
    #[default]
    Daily,
    Monthly,
}

impl TrendPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::Daily => "daily",
            TrendPeriod::Monthly => "monthly",
        }
    }

    /// `to_char` pattern used as the bucket label.
    pub fn date_format(&self) -> &'static str {
        match self {
            TrendPeriod::Daily => "YYYY-MM-DD",
            TrendPeriod::Monthly => "YYYY-MM",
        }
    }
}

impl fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(TrendPeriod::Daily),
            "monthly" => Ok(TrendPeriod::Monthly),
            other => Err(format!("unknown trend period '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub total_transactions: i64,
    pub flagged_transactions: i64,
    pub avg_risk_score: f64,
    pub total_amount: BigDecimal,
}

/// Percentage of flagged transactions, rounded to two decimals.
pub fn fraud_rate(flagged: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((flagged as f64 / total as f64) * 10_000.0).round() / 100.0
}

pub async fn dashboard_stats(pool: &PgPool) -> Result<DashboardStats> {
    let (total, flagged, total_amount, avg_score): (i64, i64, Option<BigDecimal>, Option<f64>) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE is_flagged),
                   SUM(amount),
                   AVG(fraud_risk_score)
            FROM transactions
            "#,
        )
        .fetch_one(pool)
        .await?;

    let recent_alerts = sqlx::query_as::<_, RecentAlert>(
        r#"
        SELECT a.id, a.transaction_id, t.transaction_id AS business_id, t.amount,
               a.severity, a.message, a.created_at
        FROM alerts a
        JOIN transactions t ON a.transaction_id = t.id
        WHERE a.is_resolved = false
        ORDER BY a.created_at DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats {
        total_transactions: total,
        flagged_transactions: flagged,
        total_amount: total_amount.unwrap_or_else(|| BigDecimal::from(0)),
        avg_risk_score: avg_score.map(|v| (v * 100.0).round() / 100.0).unwrap_or(0.0),
        fraud_rate: fraud_rate(flagged, total),
        recent_alerts,
    })
}

pub async fn risk_distribution(pool: &PgPool) -> Result<Vec<RiskBucket>> {
    sqlx::query_as::<_, RiskBucket>(
        r#"
        SELECT CASE
                 WHEN fraud_risk_score < 30 THEN 'Low (0-30)'
                 WHEN fraud_risk_score < 70 THEN 'Medium (30-70)'
                 ELSE 'High (70-100)'
               END AS risk_category,
               COUNT(*) AS count
        FROM transactions
        GROUP BY risk_category
        ORDER BY MIN(fraud_risk_score)
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Per-period totals for transactions created since `days` days before today,
/// oldest bucket first.
pub async fn fraud_trends(pool: &PgPool, period: TrendPeriod, days: u32) -> Result<Vec<TrendPoint>> {
    sqlx::query_as::<_, TrendPoint>(
        r#"
        SELECT to_char(created_at, $1) AS date,
               COUNT(*) AS total_transactions,
               COUNT(*) FILTER (WHERE is_flagged) AS flagged_transactions,
               AVG(fraud_risk_score) AS avg_risk_score,
               SUM(amount) AS total_amount
        FROM transactions
        WHERE created_at >= CURRENT_DATE - make_interval(days => $2)
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(period.date_format())
    .bind(i32::try_from(days).unwrap_or(i32::MAX))
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraud_rate_handles_empty_table() {
        assert_eq!(fraud_rate(0, 0), 0.0);
    }

    #[test]
    fn trend_period_parses_and_formats() {
        assert_eq!("daily".parse::<TrendPeriod>(), Ok(TrendPeriod::Daily));
        assert_eq!("Monthly".parse::<TrendPeriod>(), Ok(TrendPeriod::Monthly));
        assert!("weekly".parse::<TrendPeriod>().is_err());
        assert_eq!(TrendPeriod::default(), TrendPeriod::Daily);
        assert_eq!(TrendPeriod::Monthly.date_format(), "YYYY-MM");
    }

    #[test]
    fn fraud_rate_is_a_rounded_percentage() {
        assert_eq!(fraud_rate(1, 3), 33.33);
        assert_eq!(fraud_rate(5, 10), 50.0);
    }
}
