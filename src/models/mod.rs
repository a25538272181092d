//! Domain models for the repricing engine.
//!
//! Contexts and actions are rebuilt on every run; price records are the
//! persisted journal rows.

pub mod action;
pub mod catalog;
pub mod context;
pub mod price_record;
pub mod run_result;
pub mod season;

// Re-export all models for convenient access
pub use action::{PriceAction, PriceUpdate};
pub use catalog::{ProductItem, SaleRecord};
pub use context::PricingContext;
pub use price_record::{JournalStats, PriceRecord, StrategyCount, TIMESTAMP_FORMAT};
pub use run_result::RunResult;
pub use season::{MonthDay, SeasonPeriod};
