//! Collaborator contracts consumed by the engine and the journal.
//!
//! The marketplace HTTP client lives outside this crate; anything that
//! implements these traits can feed the engine. Every method returns a
//! `Result` and the engine decides how to degrade on failure.

pub mod outbox;
pub mod snapshot;

pub use outbox::OutboxWriter;
pub use snapshot::{CatalogSnapshot, SnapshotProvider};

use crate::error::AppResult;
use crate::models::{PriceUpdate, ProductItem, SaleRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Source of the priced catalog
#[async_trait]
pub trait ProductsProvider: Send + Sync {
    async fn get_priced_items(&self, limit: usize) -> AppResult<Vec<ProductItem>>;
}

/// Stock per item id, one call per fulfillment side
#[async_trait]
pub trait StockProvider: Send + Sync {
    /// Stock held in marketplace warehouses
    async fn get_marketplace_stock(&self) -> AppResult<HashMap<i64, i64>>;

    /// Stock held in the seller's own warehouses, summed over all of them
    async fn get_seller_stock(&self) -> AppResult<HashMap<i64, i64>>;
}

/// Order and sales analytics
#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    async fn get_avg_daily_orders(
        &self,
        item_ids: &[i64],
        window_days: u32,
    ) -> AppResult<HashMap<i64, f64>>;

    async fn get_raw_sales(&self, date_from: NaiveDate) -> AppResult<Vec<SaleRecord>>;
}

/// Write side: forward repricing and rollbacks both go through here
#[async_trait]
pub trait PriceWriter: Send + Sync {
    /// Submit one batch; returns the upload id when the marketplace gives one
    async fn submit_batch(&self, updates: &[PriceUpdate]) -> AppResult<Option<String>>;
}
