#![allow(dead_code)]

use async_trait::async_trait;
use autoprice::config::{DatabaseConfig, EngineConfig};
use autoprice::database::{create_pool, run_migrations};
use autoprice::error::{AppError, AppResult};
use autoprice::models::*;
use autoprice::providers::*;
use autoprice::repositories::PriceHistoryRepository;
use autoprice::services::PricingEngine;
use autoprice::strategies::PricingStrategy;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fixed "today" for engine runs
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()
}

pub fn date(raw: &str) -> NaiveDate {
    raw.parse().unwrap()
}

/// Fresh in-memory journal with migrations applied
pub async fn test_journal() -> PriceHistoryRepository {
    let pool = create_pool(&DatabaseConfig::in_memory())
        .await
        .expect("Failed to create test database pool");

    run_migrations(&pool).await.expect("Failed to run migrations");

    PriceHistoryRepository::new(pool).with_write_timeout(Duration::from_secs(2))
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn item(item_id: i64, price: i64, discount: i32) -> ProductItem {
    ProductItem {
        item_id,
        vendor_code: format!("SKU-{}", item_id),
        title: format!("Item {}", item_id),
        price: Decimal::from(price),
        discount,
    }
}

pub fn sale(item_id: i64, day: &str, amount: i64) -> SaleRecord {
    SaleRecord {
        item_id,
        date: date(day),
        amount_payable: Decimal::from(amount),
        is_cancelled: false,
        is_return: false,
    }
}

pub fn action(item_id: i64, old_price: i64, new_price: i64, applied: bool) -> PriceAction {
    PriceAction {
        item_id,
        vendor_code: format!("SKU-{}", item_id),
        title: format!("Item {}", item_id),
        old_price: Decimal::from(old_price),
        old_discount: 10,
        new_price: Decimal::from(new_price),
        new_discount: 15,
        reason: format!("test change {} -> {}", old_price, new_price),
        strategy_name: "StockStrategy".to_string(),
        applied,
    }
}

pub fn context(stock_total: i64, avg_daily_orders: f64, days_without_sales: i64) -> PricingContext {
    PricingContext {
        item_id: 7,
        vendor_code: "SKU-7".to_string(),
        title: "Item 7".to_string(),
        current_price: Decimal::from(1000),
        current_discount: 0,
        stock_total,
        avg_daily_orders,
        days_without_sales,
        revenue: Decimal::ZERO,
    }
}

// ============================================================================
// Fake collaborators
// ============================================================================

#[derive(Default)]
pub struct FakeProducts {
    pub items: Vec<ProductItem>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl FakeProducts {
    pub fn new(items: Vec<ProductItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ProductsProvider for FakeProducts {
    async fn get_priced_items(&self, limit: usize) -> AppResult<Vec<ProductItem>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::ExternalService("products API unavailable".to_string()));
        }
        Ok(self.items.iter().take(limit).cloned().collect())
    }
}

/// Products provider that panics mid-cycle
pub struct PanickingProducts;

#[async_trait]
impl ProductsProvider for PanickingProducts {
    async fn get_priced_items(&self, _limit: usize) -> AppResult<Vec<ProductItem>> {
        panic!("products provider exploded");
    }
}

#[derive(Default)]
pub struct FakeStock {
    pub seller: HashMap<i64, i64>,
    pub marketplace: HashMap<i64, i64>,
    pub fail_seller: bool,
    pub fail_marketplace: bool,
}

impl FakeStock {
    /// Everything held by the seller
    pub fn seller(stock: &[(i64, i64)]) -> Self {
        Self {
            seller: stock.iter().copied().collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl StockProvider for FakeStock {
    async fn get_marketplace_stock(&self) -> AppResult<HashMap<i64, i64>> {
        if self.fail_marketplace {
            return Err(AppError::ExternalService("marketplace stock unavailable".to_string()));
        }
        Ok(self.marketplace.clone())
    }

    async fn get_seller_stock(&self) -> AppResult<HashMap<i64, i64>> {
        if self.fail_seller {
            return Err(AppError::ExternalService("seller stock unavailable".to_string()));
        }
        Ok(self.seller.clone())
    }
}

#[derive(Default)]
pub struct FakeAnalytics {
    pub avg_orders: HashMap<i64, f64>,
    pub sales: Vec<SaleRecord>,
    pub fail_orders: bool,
    pub fail_sales: bool,
}

#[async_trait]
impl AnalyticsProvider for FakeAnalytics {
    async fn get_avg_daily_orders(&self, item_ids: &[i64], _window_days: u32) -> AppResult<HashMap<i64, f64>> {
        if self.fail_orders {
            return Err(AppError::ExternalService("orders analytics unavailable".to_string()));
        }
        Ok(self
            .avg_orders
            .iter()
            .filter(|(id, _)| item_ids.contains(*id))
            .map(|(id, avg)| (*id, *avg))
            .collect())
    }

    async fn get_raw_sales(&self, date_from: NaiveDate) -> AppResult<Vec<SaleRecord>> {
        if self.fail_sales {
            return Err(AppError::ExternalService("sales report unavailable".to_string()));
        }
        Ok(self.sales.iter().filter(|s| s.date >= date_from).cloned().collect())
    }
}

/// Price writer that records every call
#[derive(Default)]
pub struct RecordingWriter {
    calls: Mutex<Vec<Vec<PriceUpdate>>>,
    attempts: AtomicUsize,
    fail_calls: HashSet<usize>,
    fail_items: HashSet<i64>,
    delay: Option<Duration>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the n-th call (0-based)
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_calls.insert(n);
        self
    }

    /// Reject any batch that contains this item
    pub fn failing_for_item(mut self, item_id: i64) -> Self {
        self.fail_items.insert(item_id);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Accepted batches, in submission order
    pub fn calls(&self) -> Vec<Vec<PriceUpdate>> {
        self.calls.lock().unwrap().clone()
    }

    /// Every submission, accepted or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceWriter for RecordingWriter {
    async fn submit_batch(&self, updates: &[PriceUpdate]) -> AppResult<Option<String>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_calls.contains(&attempt) || updates.iter().any(|u| self.fail_items.contains(&u.item_id)) {
            return Err(AppError::ExternalService(format!("upload {} rejected", attempt)));
        }

        self.calls.lock().unwrap().push(updates.to_vec());
        Ok(Some(format!("upload-{}", attempt)))
    }
}

// ============================================================================
// Engine wiring
// ============================================================================

pub struct EngineFixture {
    pub engine: PricingEngine,
    pub writer: Arc<RecordingWriter>,
}

pub fn engine_with(
    products: impl ProductsProvider + 'static,
    stock: FakeStock,
    analytics: FakeAnalytics,
    writer: RecordingWriter,
    strategies: Vec<Box<dyn PricingStrategy>>,
    config: EngineConfig,
) -> EngineFixture {
    let writer = Arc::new(writer);
    let engine = PricingEngine::new(
        Arc::new(products),
        Arc::new(stock),
        Arc::new(analytics),
        writer.clone(),
        strategies,
    )
    .with_config(config)
    .as_of(today());

    EngineFixture { engine, writer }
}
