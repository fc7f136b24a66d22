//! Client side of the external fraud scoring collaborator.

pub mod client;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::transaction::{NewTransaction, RiskScore, UNKNOWN_DEVICE};

pub use client::{CircuitState, ScoringClient};

pub const SCORING_UNAVAILABLE_REASON: &str = "AI service unavailable";
pub const FALLBACK_SCORE: f64 = 50.0;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Scoring service returned status {0}")]
    Status(u16),
    #[error("Invalid response from scoring service: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open")]
    CircuitOpen,
}

/// Body sent to the scoring collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringRequest {
    pub amount: f64,
    pub currency: String,
    pub transaction_type: String,
    pub payment_method: String,
    pub location_country: String,
    pub device_type: String,
    pub hour_of_day: u32,
    /// 0 = Sunday.
    pub day_of_week: u32,
}

impl ScoringRequest {
    /// Temporal fields come from `now`, never from the caller.
    pub fn from_submission(submission: &NewTransaction, now: DateTime<Utc>) -> Self {
        use bigdecimal::ToPrimitive;

        Self {
            amount: submission.amount.to_f64().unwrap_or(f64::MAX),
            currency: submission.currency.clone(),
            transaction_type: submission.transaction_type.clone(),
            payment_method: submission.payment_method.clone(),
            location_country: submission.location_country.clone(),
            device_type: submission
                .device_type
                .clone()
                .unwrap_or_else(|| UNKNOWN_DEVICE.to_string()),
            hour_of_day: now.hour(),
            day_of_week: now.weekday().num_days_from_sunday(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudPrediction {
    pub fraud_risk_score: RiskScore,
    pub is_flagged: bool,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl FraudPrediction {
    /// Neutral result used whenever the collaborator cannot answer.
    pub fn fallback() -> Self {
        Self {
            fraud_risk_score: RiskScore::saturating(FALLBACK_SCORE),
            is_flagged: false,
            reasons: vec![SCORING_UNAVAILABLE_REASON.to_string()],
        }
    }
}

/// Result of a scoring attempt. Failures are a value, not an error.
#[derive(Debug)]
pub enum ScoreOutcome {
    Scored(FraudPrediction),
    Fallback {
        prediction: FraudPrediction,
        cause: ScoringError,
    },
}

impl ScoreOutcome {
    pub fn fallback(cause: ScoringError) -> Self {
        ScoreOutcome::Fallback {
            prediction: FraudPrediction::fallback(),
            cause,
        }
    }

    pub fn prediction(&self) -> &FraudPrediction {
        match self {
            ScoreOutcome::Scored(prediction) => prediction,
            ScoreOutcome::Fallback { prediction, .. } => prediction,
        }
    }

    pub fn into_prediction(self) -> FraudPrediction {
        match self {
            ScoreOutcome::Scored(prediction) => prediction,
            ScoreOutcome::Fallback { prediction, .. } => prediction,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ScoreOutcome::Fallback { .. })
    }
}

#[async_trait]
pub trait FraudScorer: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> ScoreOutcome;
}
