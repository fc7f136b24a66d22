use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::transaction::{RiskScore, Transaction};

pub const ALERT_TYPE_FRAUD_DETECTED: &str = "fraud_detected";

/// Scores strictly above this are high severity.
pub const HIGH_SEVERITY_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn from_score(score: RiskScore) -> Self {
        if score.value() > HIGH_SEVERITY_THRESHOLD {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Severity is fixed from the score at creation time.
    pub fn fraud_detected(tx: &Transaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: tx.id,
            alert_type: ALERT_TYPE_FRAUD_DETECTED.to_string(),
            severity: Severity::from_score(tx.fraud_risk_score),
            message: format!(
                "Transaction {} flagged with risk score {}",
                tx.transaction_id, tx.fraud_risk_score
            ),
            is_resolved: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(v: f64) -> RiskScore {
        RiskScore::new(v).unwrap()
    }

    #[test]
    fn severity_threshold_is_strictly_above_80() {
        assert_eq!(Severity::from_score(score(92.0)), Severity::High);
        assert_eq!(Severity::from_score(score(80.1)), Severity::High);
        assert_eq!(Severity::from_score(score(80.0)), Severity::Medium);
        assert_eq!(Severity::from_score(score(50.0)), Severity::Medium);
    }

    #[test]
    fn severity_round_trips_through_str() {
        assert_eq!("high".parse::<Severity>(), Ok(Severity::High));
        assert_eq!(Severity::Medium.to_string(), "medium");
        assert!("low".parse::<Severity>().is_err());
    }
}
