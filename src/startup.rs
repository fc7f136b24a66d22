use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

pub struct ValidationReport {
    pub database: bool,
    pub scoring_service: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// The scoring service being down is a warning only: intake keeps
    /// working on fallback scores.
    pub fn is_valid(&self) -> bool {
        self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Database Connectivity: {}", status(self.database));
        println!("Scoring Service:       {}", status(self.scoring_service));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> ValidationReport {
    let mut report = ValidationReport {
        database: true,
        scoring_service: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {:#}", e));
    }

    if let Err(e) = validate_scoring_service(&config.scoring.base_url).await {
        report.scoring_service = false;
        report.errors.push(format!("Scoring service: {:#}", e));
    }

    report
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_scoring_service(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let response = client
        .get(format!("{}/health", base_url.trim_end_matches('/')))
        .send()
        .await
        .context("Failed to reach scoring service")?;

    if !response.status().is_success() {
        anyhow::bail!("Scoring service returned status: {}", response.status());
    }

    Ok(())
}
