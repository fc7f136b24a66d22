use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::domain::{RiskScore, Transaction};
use crate::notifications::NotificationError;

type HmacSha256 = Hmac<Sha256>;

pub const FRAUD_ALERT_EVENT: &str = "fraud_alert";
pub const SIGNATURE_HEADER: &str = "X-Signature";

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub risk_score: RiskScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct FraudAlertEvent {
    pub event: String,
    pub transaction: TransactionSummary,
    pub timestamp: DateTime<Utc>,
}

impl FraudAlertEvent {
    pub fn new(tx: &Transaction) -> Self {
        Self {
            event: FRAUD_ALERT_EVENT.to_string(),
            transaction: TransactionSummary {
                id: tx.id,
                transaction_id: tx.transaction_id.clone(),
                amount: tx.amount.clone(),
                risk_score: tx.fraud_risk_score,
            },
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: config.url.clone(),
            secret: config.secret.clone(),
        }
    }

    /// Hex HMAC-SHA256 of the body, when a secret is configured.
    pub fn signature_for(&self, body: &[u8]) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    pub async fn send(&self, event: &FraudAlertEvent) -> Result<(), NotificationError> {
        let body = serde_json::to_vec(event)
            .map_err(|e| NotificationError::Webhook(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(signature) = self.signature_for(&body) {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| NotificationError::Webhook(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::WebhookStatus(response.status().as_u16()));
        }

        Ok(())
    }
}
