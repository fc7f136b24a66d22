pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod notifications;
pub mod ports;
pub mod scoring;
pub mod startup;
pub mod use_cases;
pub mod validation;

use std::sync::Arc;

use crate::adapters::{PostgresAlertRepository, PostgresAuditRepository, PostgresTransactionRepository};
use crate::config::Config;
use crate::notifications::AlertDispatcher;
use crate::scoring::ScoringClient;
use crate::use_cases::DecisionEngine;

/// Wires the Postgres adapters, scoring client and dispatcher into an engine.
pub fn build_engine(config: &Config, pool: sqlx::PgPool) -> anyhow::Result<DecisionEngine> {
    let transactions = Arc::new(PostgresTransactionRepository::new(pool.clone()));
    let alerts = Arc::new(PostgresAlertRepository::new(pool.clone()));
    let audit = Arc::new(PostgresAuditRepository::new(pool));

    let dispatcher = AlertDispatcher::from_config(config, transactions.clone(), alerts.clone())?;
    let scorer = Arc::new(ScoringClient::new(&config.scoring));

    Ok(DecisionEngine::new(transactions, alerts, audit, scorer, dispatcher))
}
