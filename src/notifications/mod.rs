//! Alert persistence and best-effort fraud notifications.

pub mod email;
pub mod webhook;

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{Alert, AlertContext};
use crate::ports::{AlertRepository, TransactionRepository};

pub use email::{EmailChannel, EmailMessage, Mailer, SmtpMailer};
pub use webhook::{FraudAlertEvent, WebhookNotifier};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Email delivery failed: {0}")]
    Email(String),
    #[error("No email recipient available")]
    NoRecipient,
    #[error("Webhook delivery failed: {0}")]
    Webhook(String),
    #[error("Webhook endpoint returned status {0}")]
    WebhookStatus(u16),
}

/// Result of one notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered,
    Disabled,
    Failed(String),
}

impl ChannelOutcome {
    fn from_result(result: Result<(), NotificationError>) -> Self {
        match result {
            Ok(()) => ChannelOutcome::Delivered,
            Err(e) => ChannelOutcome::Failed(e.to_string()),
        }
    }
}

/// What a dispatch did. Never an error: every failure is folded in here.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The transaction was gone by the time dispatch ran.
    TransactionMissing,
    /// Lookup or alert insert failed; no notification was attempted.
    AlertNotRecorded(String),
    Dispatched {
        alert: Alert,
        email: ChannelOutcome,
        webhook: ChannelOutcome,
    },
}

#[derive(Clone)]
pub struct AlertDispatcher {
    transactions: Arc<dyn TransactionRepository>,
    alerts: Arc<dyn AlertRepository>,
    email: Option<EmailChannel>,
    webhook: Option<WebhookNotifier>,
}

impl AlertDispatcher {
    pub fn new(transactions: Arc<dyn TransactionRepository>, alerts: Arc<dyn AlertRepository>) -> Self {
        Self {
            transactions,
            alerts,
            email: None,
            webhook: None,
        }
    }

    pub fn with_email(mut self, channel: EmailChannel) -> Self {
        self.email = Some(channel);
        self
    }

    pub fn with_webhook(mut self, notifier: WebhookNotifier) -> Self {
        self.webhook = Some(notifier);
        self
    }

    /// Enables each channel that has configuration.
    pub fn from_config(
        config: &Config,
        transactions: Arc<dyn TransactionRepository>,
        alerts: Arc<dyn AlertRepository>,
    ) -> Result<Self, NotificationError> {
        let mut dispatcher = Self::new(transactions, alerts);
        if let Some(mail) = &config.mail {
            dispatcher = dispatcher.with_email(EmailChannel::from_config(mail)?);
        }
        if let Some(webhook) = &config.webhook {
            dispatcher = dispatcher.with_webhook(WebhookNotifier::new(webhook));
        }
        Ok(dispatcher)
    }

    /// Records a fraud alert for the transaction, then tries email and webhook
    /// independently. The alert is stored before any channel is attempted.
    pub async fn dispatch(&self, transaction_id: Uuid) -> DispatchOutcome {
        let context = match self.transactions.get_alert_context(transaction_id).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                tracing::debug!(%transaction_id, "Transaction vanished before dispatch");
                return DispatchOutcome::TransactionMissing;
            }
            Err(e) => {
                tracing::error!(%transaction_id, error = %e, "Failed to load transaction for alert");
                return DispatchOutcome::AlertNotRecorded(e.to_string());
            }
        };

        let alert = match self.alerts.insert(&Alert::fraud_detected(&context.transaction)).await {
            Ok(alert) => alert,
            Err(e) => {
                tracing::error!(
                    transaction = %context.transaction.transaction_id,
                    error = %e,
                    "Failed to record fraud alert"
                );
                return DispatchOutcome::AlertNotRecorded(e.to_string());
            }
        };
        tracing::info!(
            transaction = %context.transaction.transaction_id,
            severity = %alert.severity,
            "Fraud alert recorded"
        );

        let email = self.send_email(&context).await;
        let webhook = self.send_webhook(&context).await;

        DispatchOutcome::Dispatched {
            alert,
            email,
            webhook,
        }
    }

    async fn send_email(&self, context: &AlertContext) -> ChannelOutcome {
        let Some(channel) = &self.email else {
            return ChannelOutcome::Disabled;
        };

        let outcome = ChannelOutcome::from_result(channel.notify(context).await);
        if let ChannelOutcome::Failed(reason) = &outcome {
            tracing::warn!(
                transaction = %context.transaction.transaction_id,
                %reason,
                "Fraud alert email failed"
            );
        }
        outcome
    }

    async fn send_webhook(&self, context: &AlertContext) -> ChannelOutcome {
        let Some(notifier) = &self.webhook else {
            return ChannelOutcome::Disabled;
        };

        let event = FraudAlertEvent::new(&context.transaction);
        let outcome = ChannelOutcome::from_result(notifier.send(&event).await);
        if let ChannelOutcome::Failed(reason) = &outcome {
            tracing::warn!(
                transaction = %context.transaction.transaction_id,
                %reason,
                "Fraud alert webhook failed"
            );
        }
        outcome
    }
}
