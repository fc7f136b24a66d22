use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;
use crate::db::queries::{TrendPeriod, DEFAULT_TREND_DAYS};
use crate::domain::{Actor, NewTransaction, Role, TransactionFilter, TransactionUpdate};
use crate::use_cases::DecisionEngine;

#[derive(Parser)]
#[command(name = "fraud-sentinel")]
#[command(about = "Fraud Sentinel - transaction scoring and fraud alerting", long_about = None)]
pub struct Cli {
    /// Acting user
    #[arg(long, global = true, env = "ACTOR_USER_ID", default_value_t = Uuid::nil())]
    pub user: Uuid,

    /// Role of the acting user (admin, analyst, viewer)
    #[arg(long, global = true, env = "ACTOR_ROLE", default_value = "viewer")]
    pub role: Role,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user, self.role)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transaction commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Dashboard statistics and risk distribution
    Stats {
        #[command(subcommand)]
        command: Option<StatsCommands>,
    },

    /// Configuration validation
    Config,

    /// Check database and scoring service connectivity
    Check,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Score and record a transaction read from a JSON file
    Submit {
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Show one transaction with its alerts and audit trail
    Get {
        #[arg(value_name = "TX_ID")]
        id: Uuid,
    },

    /// List transactions
    List {
        #[arg(long)]
        flagged: Option<bool>,
        #[arg(long)]
        min_risk_score: Option<f64>,
        #[arg(long)]
        start_date: Option<DateTime<Utc>>,
        #[arg(long)]
        end_date: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = TransactionFilter::DEFAULT_LIMIT)]
        limit: u32,
    },

    /// Update status and/or confirmed-fraud
    Update {
        #[arg(value_name = "TX_ID")]
        id: Uuid,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        confirmed_fraud: Option<bool>,
    },

    /// Flag a transaction as fraud (admin, analyst)
    Flag {
        #[arg(value_name = "TX_ID")]
        id: Uuid,
    },

    /// Delete a transaction (admin)
    Delete {
        #[arg(value_name = "TX_ID")]
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum StatsCommands {
    /// Transaction totals per day or month
    Trends {
        /// daily or monthly
        #[arg(long, default_value_t = TrendPeriod::Daily)]
        period: TrendPeriod,
        #[arg(long, default_value_t = DEFAULT_TREND_DAYS)]
        days: u32,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx(engine: &DecisionEngine, actor: &Actor, command: TxCommands) -> anyhow::Result<()> {
    match command {
        TxCommands::Submit { file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let submission: NewTransaction = serde_json::from_str(&raw)?;
            let tx = engine.submit(actor, submission).await?;
            println!("✓ Transaction {} recorded", tx.transaction_id);
            print_json(&tx)?;
        }
        TxCommands::Get { id } => {
            let detail = engine.get(id).await?;
            let alerts = engine.alerts_for(id).await?;
            let audit = engine.audit_trail(id).await?;
            print_json(&serde_json::json!({
                "transaction": detail,
                "alerts": alerts,
                "audit": audit,
            }))?;
        }
        TxCommands::List {
            flagged,
            min_risk_score,
            start_date,
            end_date,
            page,
            limit,
        } => {
            let filter = TransactionFilter {
                is_flagged: flagged,
                min_risk_score,
                start_date,
                end_date,
                page,
                limit,
            };
            let result = engine.list(&filter).await?;
            print_json(&serde_json::json!({
                "transactions": result.transactions,
                "pagination": {
                    "page": result.page,
                    "limit": result.limit,
                    "total": result.total,
                    "total_pages": result.total_pages(),
                }
            }))?;
        }
        TxCommands::Update {
            id,
            status,
            confirmed_fraud,
        } => {
            let tx = engine
                .update(
                    actor,
                    id,
                    TransactionUpdate {
                        status,
                        is_fraud: confirmed_fraud,
                    },
                )
                .await?;
            println!("✓ Transaction {} updated", tx.transaction_id);
            print_json(&tx)?;
        }
        TxCommands::Flag { id } => {
            let tx = engine.flag(actor, id).await?;
            println!("✓ Transaction {} flagged as fraud", tx.transaction_id);
        }
        TxCommands::Delete { id } => {
            engine.delete(actor, id).await?;
            println!("✓ Transaction {} deleted", id);
        }
    }

    Ok(())
}

pub async fn handle_stats(pool: &PgPool, command: Option<StatsCommands>) -> anyhow::Result<()> {
    if let Some(StatsCommands::Trends { period, days }) = command {
        if days == 0 {
            anyhow::bail!("--days must be at least 1");
        }
        let trends = crate::db::queries::fraud_trends(pool, period, days).await?;
        return print_json(&serde_json::json!({
            "period": period.as_str(),
            "days": days,
            "trends": trends,
        }));
    }

    let stats = crate::db::queries::dashboard_stats(pool).await?;
    let distribution = crate::db::queries::risk_distribution(pool).await?;
    print_json(&serde_json::json!({
        "stats": stats,
        "distribution": distribution,
    }))
}

pub async fn handle_db_migrate(pool: &PgPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations...");
    crate::db::run_migrations(pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_check(config: &Config, pool: &PgPool) -> anyhow::Result<()> {
    let report = crate::startup::validate_environment(config, pool).await;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("Startup validation failed");
    }
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Scoring Service URL: {}", config.scoring.base_url);
    println!("  Scoring Timeout: {} ms", config.scoring.timeout.as_millis());
    match &config.mail {
        Some(mail) => println!(
            "  Email: {}@{}:{} (password ****), from {}, admin {}",
            mail.username,
            mail.host,
            mail.port,
            mail.from,
            mail.admin_recipient.as_deref().unwrap_or("<submitter>")
        ),
        None => println!("  Email: disabled"),
    }
    match &config.webhook {
        Some(webhook) => println!(
            "  Webhook: {} (signed: {})",
            webhook.url,
            webhook.secret.is_some()
        ),
        None => println!("  Webhook: disabled"),
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_database_password() {
        assert_eq!(
            mask_password("postgres://fraud:hunter2@db:5432/fraud"),
            "postgres://fraud:****@db:5432/fraud"
        );
        assert_eq!(mask_password("postgres://db/fraud"), "postgres://db/fraud");
    }

    #[test]
    fn parses_submit_command_with_actor() {
        let cli = Cli::try_parse_from([
            "fraud-sentinel",
            "--user",
            "6f1c1f2e-7c1a-4f7e-9d55-5a3c2b1e0f00",
            "--role",
            "analyst",
            "tx",
            "submit",
            "--file",
            "tx.json",
        ])
        .unwrap();

        assert_eq!(cli.actor().role, Role::Analyst);
        assert!(matches!(cli.command, Commands::Tx(TxCommands::Submit { .. })));
    }

    #[test]
    fn parses_stats_trends() {
        let cli = Cli::try_parse_from(["fraud-sentinel", "stats", "trends", "--period", "monthly", "--days", "90"])
            .unwrap();
        match cli.command {
            Commands::Stats {
                command: Some(StatsCommands::Trends { period, days }),
            } => {
                assert_eq!(period, TrendPeriod::Monthly);
                assert_eq!(days, 90);
            }
            _ => panic!("expected stats trends"),
        }

        let cli = Cli::try_parse_from(["fraud-sentinel", "stats"]).unwrap();
        assert!(matches!(cli.command, Commands::Stats { command: None }));
    }

    #[test]
    fn parses_partial_update() {
        let cli = Cli::try_parse_from([
            "fraud-sentinel",
            "tx",
            "update",
            "6f1c1f2e-7c1a-4f7e-9d55-5a3c2b1e0f00",
            "--status",
            "reviewed",
        ])
        .unwrap();

        match cli.command {
            Commands::Tx(TxCommands::Update {
                status,
                confirmed_fraud,
                ..
            }) => {
                assert_eq!(status.as_deref(), Some("reviewed"));
                assert_eq!(confirmed_fraud, None);
            }
            _ => panic!("expected update command"),
        }
    }
}
