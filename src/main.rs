use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fraud_sentinel::cli::{self, Cli, Commands, DbCommands};
use fraud_sentinel::config::{Config, LogFormat};
use fraud_sentinel::{build_engine, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    if let Commands::Config = args.command {
        return cli::handle_config_validate(&config);
    }

    // Database pool
    let pool = db::create_pool(&config).await?;
    let actor = args.actor();

    match args.command {
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&pool).await,
        Commands::Check => cli::handle_check(&config, &pool).await,
        Commands::Stats { command } => cli::handle_stats(&pool, command).await,
        Commands::Tx(command) => {
            let engine = build_engine(&config, pool)?;
            tracing::info!("Scoring service at {}", config.scoring.base_url);
            cli::handle_tx(&engine, &actor, command).await
        }
        Commands::Config => Ok(()),
    }
}
