use super::{AnalyticsProvider, ProductsProvider, StockProvider};
use crate::error::AppResult;
use crate::models::{ProductItem, SaleRecord};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntry {
    pub item_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: String,
    #[serde(default)]
    pub stocks: Vec<StockEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub item_id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_cancelled: bool,
}

/// Catalog export as written by the marketplace sync job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub items: Vec<ProductItem>,
    #[serde(default)]
    pub marketplace_stock: Vec<StockEntry>,
    #[serde(default)]
    pub seller_warehouses: Vec<Warehouse>,
    #[serde(default)]
    pub orders: Vec<OrderRecord>,
    #[serde(default)]
    pub sales: Vec<SaleRecord>,
}

fn sum_by_item<'a>(entries: impl Iterator<Item = &'a StockEntry>) -> HashMap<i64, i64> {
    let mut totals = HashMap::new();
    for entry in entries {
        *totals.entry(entry.item_id).or_insert(0) += entry.quantity;
    }
    totals
}

/// Read-side collaborators backed by a JSON snapshot file
///
/// The file is re-read on every call so a long-running scheduler picks up
/// each new export.
pub struct SnapshotProvider {
    path: PathBuf,
    as_of: Option<NaiveDate>,
}

impl SnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            as_of: None,
        }
    }

    /// Treat `date` as today when averaging orders
    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    async fn load(&self) -> AppResult<CatalogSnapshot> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&raw)?;
        debug!(
            "Loaded snapshot {:?}: {} items, {} sales",
            self.path,
            snapshot.items.len(),
            snapshot.sales.len()
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl ProductsProvider for SnapshotProvider {
    async fn get_priced_items(&self, limit: usize) -> AppResult<Vec<ProductItem>> {
        let mut items = self.load().await?.items;
        items.truncate(limit);
        Ok(items)
    }
}

#[async_trait]
impl StockProvider for SnapshotProvider {
    async fn get_marketplace_stock(&self) -> AppResult<HashMap<i64, i64>> {
        let snapshot = self.load().await?;
        Ok(sum_by_item(snapshot.marketplace_stock.iter()))
    }

    async fn get_seller_stock(&self) -> AppResult<HashMap<i64, i64>> {
        let snapshot = self.load().await?;
        Ok(sum_by_item(
            snapshot.seller_warehouses.iter().flat_map(|w| w.stocks.iter()),
        ))
    }
}

#[async_trait]
impl AnalyticsProvider for SnapshotProvider {
    async fn get_avg_daily_orders(
        &self,
        item_ids: &[i64],
        window_days: u32,
    ) -> AppResult<HashMap<i64, f64>> {
        let snapshot = self.load().await?;
        let today = self.as_of.unwrap_or_else(|| Local::now().date_naive());
        let since = today - Duration::days(i64::from(window_days));
        let days = f64::from(window_days.max(1));

        let mut counts: HashMap<i64, u32> = item_ids.iter().map(|id| (*id, 0)).collect();
        for order in snapshot
            .orders
            .iter()
            .filter(|o| !o.is_cancelled && o.date > since && o.date <= today)
        {
            if let Some(count) = counts.get_mut(&order.item_id) {
                *count += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(id, count)| (id, f64::from(count) / days))
            .collect())
    }

    async fn get_raw_sales(&self, date_from: NaiveDate) -> AppResult<Vec<SaleRecord>> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .sales
            .into_iter()
            .filter(|s| s.date >= date_from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "items": [
            {"item_id": 1, "vendor_code": "MUG-1", "title": "Mug", "price": "990", "discount": 10},
            {"item_id": 2, "vendor_code": "CUP-2", "price": 450}
        ],
        "marketplace_stock": [
            {"item_id": 1, "quantity": 4},
            {"item_id": 1, "quantity": 6}
        ],
        "seller_warehouses": [
            {"id": "north", "stocks": [{"item_id": 1, "quantity": 3}, {"item_id": 2, "quantity": 7}]},
            {"id": "south", "stocks": [{"item_id": 2, "quantity": 1}]}
        ],
        "orders": [
            {"item_id": 1, "date": "2026-10-18"},
            {"item_id": 1, "date": "2026-10-10"},
            {"item_id": 1, "date": "2026-10-11", "is_cancelled": true},
            {"item_id": 1, "date": "2026-08-01"}
        ],
        "sales": [
            {"item_id": 1, "date": "2026-10-18", "amount_payable": "800.50"},
            {"item_id": 2, "date": "2026-09-01", "amount_payable": "300"}
        ]
    }"#;

    fn provider() -> (tempfile::NamedTempFile, SnapshotProvider) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        let provider = SnapshotProvider::new(file.path())
            .as_of(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        (file, provider)
    }

    #[tokio::test]
    async fn test_items_and_stock() {
        let (_file, provider) = provider();

        let items = provider.get_priced_items(1000).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].display_title(), "CUP-2");
        assert_eq!(provider.get_priced_items(1).await.unwrap().len(), 1);

        let marketplace = provider.get_marketplace_stock().await.unwrap();
        assert_eq!(marketplace.get(&1), Some(&10));

        let seller = provider.get_seller_stock().await.unwrap();
        assert_eq!(seller.get(&1), Some(&3));
        assert_eq!(seller.get(&2), Some(&8));
    }

    #[tokio::test]
    async fn test_analytics() {
        let (_file, provider) = provider();

        let orders = provider.get_avg_daily_orders(&[1, 2], 10).await.unwrap();
        assert!((orders[&1] - 0.2).abs() < 1e-9);
        assert_eq!(orders[&2], 0.0);

        let sales = provider
            .get_raw_sales(NaiveDate::from_ymd_opt(2026, 9, 19).unwrap())
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].item_id, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let provider = SnapshotProvider::new("/nonexistent/catalog.json");
        assert!(provider.get_priced_items(10).await.is_err());
    }
}
