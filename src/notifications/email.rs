use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;

use crate::config::MailConfig;
use crate::domain::AlertContext;
use crate::notifications::NotificationError;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// STARTTLS SMTP delivery.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, NotificationError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotificationError::Email(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| NotificationError::Email(format!("invalid sender: {}", e)))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| NotificationError::Email(format!("invalid recipient: {}", e)))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|e| NotificationError::Email(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotificationError::Email(e.to_string()))?;
        Ok(())
    }
}

/// Email channel settings plus the transport that delivers them.
#[derive(Clone)]
pub struct EmailChannel {
    mailer: Arc<dyn Mailer>,
    from: String,
    admin_recipient: Option<String>,
}

impl EmailChannel {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, admin_recipient: Option<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            admin_recipient,
        }
    }

    pub fn from_config(config: &MailConfig) -> Result<Self, NotificationError> {
        let mailer = SmtpMailer::new(config)?;
        Ok(Self::new(
            Arc::new(mailer),
            config.from.clone(),
            config.admin_recipient.clone(),
        ))
    }

    pub async fn notify(&self, context: &AlertContext) -> Result<(), NotificationError> {
        let message = compose_fraud_alert(context, &self.from, self.admin_recipient.as_deref())?;
        self.mailer.send(&message).await
    }
}

/// Admin recipient wins over the submitter's address.
pub fn compose_fraud_alert(
    context: &AlertContext,
    from: &str,
    admin_recipient: Option<&str>,
) -> Result<EmailMessage, NotificationError> {
    let tx = &context.transaction;
    let to = admin_recipient
        .map(str::to_string)
        .or_else(|| context.submitter_email.clone())
        .ok_or(NotificationError::NoRecipient)?;

    let html_body = format!(
        "<h2>Fraud Alert</h2>\n\
         <p>A transaction has been flagged as potentially fraudulent:</p>\n\
         <ul>\n\
         <li><strong>Transaction ID:</strong> {}</li>\n\
         <li><strong>Amount:</strong> {} {}</li>\n\
         <li><strong>Risk Score:</strong> {}/100</li>\n\
         <li><strong>Merchant:</strong> {}</li>\n\
         <li><strong>Location:</strong> {}</li>\n\
         </ul>\n\
         <p>Please review this transaction immediately.</p>\n",
        escape_html(&tx.transaction_id),
        escape_html(&tx.currency),
        tx.amount,
        tx.fraud_risk_score,
        escape_html(tx.merchant_name.as_deref().unwrap_or("N/A")),
        escape_html(&tx.location()),
    );

    Ok(EmailMessage {
        from: from.to_string(),
        to,
        subject: format!("Fraud Alert: Transaction {}", tx.transaction_id),
        html_body,
    })
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
