//! Autoprice Service
//!
//! Command-line entry point for the repricing engine:
//! - one-off and scheduled repricing runs
//! - journal inspection, rollback and retention

use anyhow::{bail, Context, Result};
use autoprice::config::AppConfig;
use autoprice::services::PricingEngine;
use autoprice::AppState;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "autoprice")]
#[command(version, about = "Automated marketplace repricing with an auditable price journal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single repricing cycle
    Once {
        /// Submit the changes instead of only proposing them
        #[arg(long)]
        apply: bool,
    },

    /// Run the recurring scheduler until Ctrl+C
    Schedule {
        /// Submit the changes instead of only proposing them
        #[arg(long)]
        apply: bool,
    },

    /// Price history of one item, newest first
    History {
        #[arg(long)]
        item: i64,

        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// All journaled changes in a date range
    List {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (inclusive), YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(long)]
        applied_only: bool,

        #[arg(short, long, default_value_t = 200)]
        limit: i64,
    },

    /// Journal statistics
    Stats,

    /// Restore previous prices
    Rollback {
        /// Revert the last applied change of this item
        #[arg(long, conflicts_with = "since_hours", required_unless_present = "since_hours")]
        item: Option<i64>,

        /// Revert every item changed in the last N hours
        #[arg(long)]
        since_hours: Option<i64>,
    },

    /// Delete journal records older than N days
    Purge {
        #[arg(long)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("Configuration error")?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("autoprice={},sqlx=warn", config.log_level).into()
            }),
        )
        .init();

    let state = AppState::from_config(config)
        .await
        .context("Failed to initialize application state")?;

    match cli.command {
        Commands::Once { apply } => run_once(&state, apply).await,
        Commands::Schedule { apply } => run_schedule(&state, apply).await,
        Commands::History { item, limit } => {
            let records = state.journal.get_by_item(item, limit).await?;
            if records.is_empty() {
                println!("No price history for item {}", item);
            }
            for record in records {
                println!(
                    "{} | {} -> {} | {}% -> {}% | {} | {}{}",
                    record.created_at,
                    record.old_price,
                    record.new_price,
                    record.old_discount,
                    record.new_discount,
                    record.strategy_name,
                    record.reason,
                    status_suffix(record.applied, record.rolled_back)
                );
            }
            Ok(())
        }
        Commands::List { from, to, applied_only, limit } => {
            let records = state.journal.get_all(from, to, applied_only, limit).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Commands::Stats => {
            let stats = state.journal.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Rollback { item, since_hours } => {
            run_rollback(&state, item, since_hours).await
        }
        Commands::Purge { days } => {
            let deleted = state.journal.purge_old(days).await?;
            println!("Deleted {} records older than {} days", deleted, days);
            Ok(())
        }
    }
}

fn status_suffix(applied: bool, rolled_back: bool) -> &'static str {
    match (applied, rolled_back) {
        (_, true) => " [rolled back]",
        (true, false) => " [applied]",
        (false, false) => " [proposed]",
    }
}

async fn run_once(state: &AppState, apply: bool) -> Result<()> {
    info!("Single repricing run (apply={})", apply);

    let actions = state.engine.run(!apply).await?;
    if !actions.is_empty() {
        let recorded = state
            .journal
            .record_many(&actions)
            .await
            .context("Failed to journal price changes")?;
        info!("Journaled {} changes", recorded);
    }

    println!("{}", PricingEngine::summary(&actions));
    Ok(())
}

async fn run_schedule(state: &AppState, apply: bool) -> Result<()> {
    let retention_days = state.config.database.retention_days;
    match state.journal.purge_old(retention_days).await {
        Ok(deleted) if deleted > 0 => info!("Purged {} journal records past retention", deleted),
        Ok(_) => {}
        Err(e) => warn!("Journal purge failed: {}", e),
    }

    let scheduler = state.scheduler(!apply)?;
    scheduler.start().await?;

    let status = scheduler.get_status().await;
    info!(
        "Scheduler running: {} next at {}",
        status.job_name.as_deref().unwrap_or("-"),
        status.next_run.as_deref().unwrap_or("-")
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    scheduler.stop().await;

    for result in scheduler.get_history(10).await {
        println!("{}", result);
    }
    Ok(())
}

async fn run_rollback(state: &AppState, item: Option<i64>, since_hours: Option<i64>) -> Result<()> {
    let writer = state.writer.as_ref();

    match (item, since_hours) {
        (Some(item_id), _) => {
            if state.journal.rollback_last(item_id, writer).await? {
                println!("Item {} rolled back", item_id);
            } else {
                println!("Nothing rolled back for item {}", item_id);
            }
        }
        (None, Some(hours)) => {
            let results = state.journal.rollback_since(hours, writer).await?;
            if results.is_empty() {
                println!("No applied changes in the last {}h", hours);
            }
            let mut items: Vec<_> = results.into_iter().collect();
            items.sort_by_key(|(item_id, _)| *item_id);
            for (item_id, ok) in items {
                if ok {
                    println!("Item {}: rolled back", item_id);
                } else {
                    error!("Item {}: rollback failed", item_id);
                    println!("Item {}: rollback FAILED", item_id);
                }
            }
        }
        (None, None) => bail!("Pass --item or --since-hours"),
    }
    Ok(())
}
