//! Transaction domain entity.
//! Framework-agnostic representation of a transaction submitted for fraud evaluation.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::actor::Actor;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const INITIAL_STATUS: &str = "pending";
pub const UNKNOWN_DEVICE: &str = "unknown";

/// Fraud risk score, always within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RiskScore(f64);

impl RiskScore {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;

    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (Self::MIN..=Self::MAX).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Clamps into range. Used when reading rows already guarded by a CHECK constraint.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for RiskScore {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        RiskScore::new(value).ok_or_else(|| format!("risk score {} is outside [0, 100]", value))
    }
}

impl From<RiskScore> for f64 {
    fn from(score: RiskScore) -> Self {
        score.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Domain entity representing a scored transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_id: String,
    pub user_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub currency: String,
    pub merchant_name: Option<String>,
    pub transaction_type: String,
    pub payment_method: String,
    pub card_number_last4: Option<String>,
    pub location_country: String,
    pub location_city: Option<String>,
    pub ip_address: Option<String>,
    pub device_type: Option<String>,
    pub fraud_risk_score: RiskScore,
    pub is_flagged: bool,
    pub is_fraud: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds the record persisted after scoring. The score and flag come only
    /// from the scoring result, never from the submission.
    pub fn new(
        submission: NewTransaction,
        submitter: &Actor,
        fraud_risk_score: RiskScore,
        is_flagged: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id: submission.transaction_id,
            user_id: Some(submitter.user_id),
            amount: submission.amount,
            currency: submission.currency,
            merchant_name: submission.merchant_name,
            transaction_type: submission.transaction_type,
            payment_method: submission.payment_method,
            card_number_last4: submission.card_number_last4,
            location_country: submission.location_country,
            location_city: submission.location_city,
            ip_address: submission.ip_address,
            device_type: submission.device_type,
            fraud_risk_score,
            is_flagged,
            is_fraud: false,
            status: INITIAL_STATUS.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn location(&self) -> String {
        match &self.location_city {
            Some(city) => format!("{}, {}", city, self.location_country),
            None => self.location_country.clone(),
        }
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Caller-supplied submission. Carries no score or flag fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub amount: BigDecimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    pub transaction_type: String,
    pub payment_method: String,
    #[serde(default)]
    pub card_number_last4: Option<String>,
    pub location_country: String,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
}

/// Partial update. Only provided fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fraud: Option<bool>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.is_fraud.is_none()
    }

    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(status) = &self.status {
            tx.status = status.clone();
        }
        if let Some(is_fraud) = self.is_fraud {
            tx.is_fraud = is_fraud;
        }
        tx.updated_at = Utc::now();
    }
}

/// Transaction together with its count of unresolved alerts.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub alert_count: i64,
}

/// Transaction joined with the submitting user's contact details.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub transaction: Transaction,
    pub submitter_email: Option<String>,
    pub submitter_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    pub is_flagged: Option<bool>,
    pub min_risk_score: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: u32,
    pub limit: u32,
}

impl TransactionFilter {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.limit)
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.is_flagged.map_or(true, |flagged| tx.is_flagged == flagged)
            && self
                .min_risk_score
                .map_or(true, |min| tx.fraud_risk_score.value() >= min)
            && self.start_date.map_or(true, |start| tx.created_at >= start)
            && self.end_date.map_or(true, |end| tx.created_at <= end)
    }
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            is_flagged: None,
            min_risk_score: None,
            start_date: None,
            end_date: None,
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

impl TransactionPage {
    pub fn total_pages(&self) -> i64 {
        if self.limit == 0 {
            return 0;
        }
        let limit = i64::from(self.limit);
        (self.total + limit - 1) / limit
    }
}
