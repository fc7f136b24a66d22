use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SCORING_URL: &str = "http://localhost:5001";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SMTP_FROM: &str = "noreply@frauddetection.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub scoring: ScoringConfig,
    pub mail: Option<MailConfig>,
    pub webhook: Option<WebhookConfig>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub breaker_failures: u32,
    pub breaker_reset: Duration,
}

impl ScoringConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            breaker_failures: 5,
            breaker_reset: Duration::from_secs(30),
        }
    }
}

/// Present only when SMTP credentials are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub admin_recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;

        let scoring_url = get("SCORING_SERVICE_URL").unwrap_or_else(|| DEFAULT_SCORING_URL.to_string());
        validate_url("SCORING_SERVICE_URL", &scoring_url)?;

        let scoring = ScoringConfig {
            base_url: scoring_url,
            timeout: Duration::from_millis(parse_or("SCORING_TIMEOUT_MS", get("SCORING_TIMEOUT_MS"), DEFAULT_TIMEOUT_MS)?),
            breaker_failures: parse_or("SCORING_BREAKER_FAILURES", get("SCORING_BREAKER_FAILURES"), 5)?,
            breaker_reset: Duration::from_secs(parse_or("SCORING_BREAKER_RESET_SECS", get("SCORING_BREAKER_RESET_SECS"), 30)?),
        };

        // The mail channel is silently disabled without credentials.
        let mail = match (get("SMTP_USER"), get("SMTP_PASS")) {
            (Some(username), Some(password)) => Some(MailConfig {
                host: get("SMTP_HOST").context("SMTP_HOST must be set when SMTP credentials are")?,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), DEFAULT_SMTP_PORT)?,
                username,
                password,
                from: get("SMTP_FROM").unwrap_or_else(|| DEFAULT_SMTP_FROM.to_string()),
                admin_recipient: get("ADMIN_EMAIL"),
            }),
            _ => None,
        };

        let webhook = match get("WEBHOOK_URL") {
            Some(url) => {
                validate_url("WEBHOOK_URL", &url)?;
                Some(WebhookConfig {
                    url,
                    secret: get("WEBHOOK_SECRET"),
                    timeout: Duration::from_millis(parse_or("WEBHOOK_TIMEOUT_MS", get("WEBHOOK_TIMEOUT_MS"), DEFAULT_TIMEOUT_MS)?),
                })
            }
            None => None,
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Config {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 5)?,
            scoring,
            mail,
            webhook,
            log_format,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, value)),
        None => Ok(default),
    }
}

fn validate_url(key: &str, value: &str) -> anyhow::Result<()> {
    let parsed = Url::parse(value).with_context(|| format!("{} is not a valid URL", key))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("{} must use http or https", key);
    }
    Ok(())
}
