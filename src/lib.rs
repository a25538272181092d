//! Autoprice Library
//!
//! Automated marketplace repricing: pluggable strategies, a batch engine,
//! an auditable price-change journal with rollback, and a scheduler.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod providers;
pub mod repositories;
pub mod services;
pub mod strategies;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use providers::{OutboxWriter, PriceWriter, SnapshotProvider};
use repositories::PriceHistoryRepository;
use services::{PriceScheduler, PricingEngine};
use std::sync::Arc;
use tracing::info;

/// Application state wired from configuration
pub struct AppState {
    pub config: AppConfig,
    pub journal: Arc<PriceHistoryRepository>,
    pub engine: Arc<PricingEngine>,
    pub writer: Arc<dyn PriceWriter>,
}

impl AppState {
    /// Open the journal and build the engine over the snapshot and outbox
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let journal = PriceHistoryRepository::open(&config.database)
            .await?
            .with_write_timeout(config.engine.submit_timeout());
        info!("Journal ready at {}", config.database.url);

        let snapshot = Arc::new(SnapshotProvider::new(&config.snapshot_path));
        let writer: Arc<dyn PriceWriter> = Arc::new(OutboxWriter::new(&config.outbox_path)?);
        let strategies = strategies::build_strategies(&config.strategies)?;

        let engine = PricingEngine::new(
            snapshot.clone(),
            snapshot.clone(),
            snapshot,
            Arc::clone(&writer),
            strategies,
        )
        .with_config(config.engine.clone());
        info!("Strategies: {}", engine.strategy_names().join(", "));

        Ok(Self {
            config,
            journal: Arc::new(journal),
            engine: Arc::new(engine),
            writer,
        })
    }

    /// Scheduler over the shared engine, journaling every cycle
    pub fn scheduler(&self, dry_run: bool) -> AppResult<PriceScheduler> {
        let mut scheduler_config = self.config.scheduler.clone();
        scheduler_config.dry_run = dry_run;

        Ok(PriceScheduler::from_config(Arc::clone(&self.engine), &scheduler_config)?
            .with_journal(Arc::clone(&self.journal)))
    }
}
