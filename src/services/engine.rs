use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::models::{PriceAction, PriceUpdate, PricingContext, ProductItem, SaleRecord};
use crate::providers::{AnalyticsProvider, PriceWriter, ProductsProvider, StockProvider};
use crate::strategies::PricingStrategy;
use chrono::{Duration, Local, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Line returned by [`PricingEngine::summary`] when nothing changed
pub const NO_CHANGES_MESSAGE: &str = "No price changes required.";

/// Per-item inputs gathered from the read-side providers
#[derive(Debug, Default)]
struct MarketData {
    stock: HashMap<i64, i64>,
    avg_orders: HashMap<i64, f64>,
    days_without_sales: HashMap<i64, i64>,
    revenue: HashMap<i64, Decimal>,
}

/// Repricing engine: gathers data, asks the strategies, submits the results
pub struct PricingEngine {
    products: Arc<dyn ProductsProvider>,
    stocks: Arc<dyn StockProvider>,
    analytics: Arc<dyn AnalyticsProvider>,
    writer: Arc<dyn PriceWriter>,
    strategies: Vec<Box<dyn PricingStrategy>>,
    config: EngineConfig,
    today: Option<NaiveDate>,
}

impl PricingEngine {
    pub fn new(
        products: Arc<dyn ProductsProvider>,
        stocks: Arc<dyn StockProvider>,
        analytics: Arc<dyn AnalyticsProvider>,
        writer: Arc<dyn PriceWriter>,
        strategies: Vec<Box<dyn PricingStrategy>>,
    ) -> Self {
        Self {
            products,
            stocks,
            analytics,
            writer,
            strategies,
            config: EngineConfig::default(),
            today: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin the calendar date used for sales windows
    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }

    /// Active strategy names in priority order
    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Run one repricing cycle
    ///
    /// With `dry_run` nothing is submitted and every action stays unapplied.
    pub async fn run(&self, dry_run: bool) -> AppResult<Vec<PriceAction>> {
        self.run_with_cancel(dry_run, &AtomicBool::new(false)).await
    }

    /// Run one cycle, checking `cancel` between phases
    ///
    /// A cancel observed before submission returns [`AppError::Cancelled`].
    /// Once submission has started, remaining batches are skipped and the
    /// actions are returned with whatever was applied so far.
    pub async fn run_with_cancel(&self, dry_run: bool, cancel: &AtomicBool) -> AppResult<Vec<PriceAction>> {
        let items = match self.products.get_priced_items(self.config.products_limit).await {
            Ok(items) => items,
            Err(e) => {
                error!("Failed to load priced items: {}", e);
                return Ok(Vec::new());
            }
        };

        if items.is_empty() {
            warn!("No priced items returned, nothing to reprice");
            return Ok(Vec::new());
        }
        info!("Loaded {} priced items", items.len());
        check_cancel(cancel)?;

        let data = self.gather(&items).await;
        check_cancel(cancel)?;

        let contexts = build_contexts(&items, &data, self.config.no_sales_ceiling_days);
        let mut actions: Vec<PriceAction> = contexts.iter().filter_map(|ctx| self.evaluate(ctx)).collect();
        info!(
            "Evaluated {} items, {} price changes proposed",
            contexts.len(),
            actions.len()
        );

        if dry_run || actions.is_empty() {
            return Ok(actions);
        }
        check_cancel(cancel)?;

        let applied = self.apply(&mut actions, cancel).await;
        info!("Applied {} / {} price changes", applied, actions.len());

        Ok(actions)
    }

    /// First strategy with a proposal wins
    pub fn evaluate(&self, ctx: &PricingContext) -> Option<PriceAction> {
        self.strategies.iter().find_map(|strategy| {
            let action = strategy.evaluate(ctx)?;
            debug!(
                "{}: item {} {} -> {} ({})",
                strategy.name(),
                ctx.item_id,
                ctx.current_price,
                action.new_price,
                action.reason
            );
            Some(action)
        })
    }

    async fn gather(&self, items: &[ProductItem]) -> MarketData {
        let item_ids: Vec<i64> = items.iter().map(|item| item.item_id).collect();
        let today = self.today();
        let date_from = today - Duration::days(i64::from(self.config.analytics_days));

        let (seller, marketplace, avg_orders, sales) = tokio::join!(
            self.stocks.get_seller_stock(),
            self.stocks.get_marketplace_stock(),
            self.analytics.get_avg_daily_orders(&item_ids, self.config.analytics_days),
            self.analytics.get_raw_sales(date_from),
        );

        let seller = seller.unwrap_or_else(|e| {
            warn!("Seller stock unavailable, treating as empty: {}", e);
            HashMap::new()
        });
        let marketplace = marketplace.unwrap_or_else(|e| {
            warn!("Marketplace stock unavailable, treating as empty: {}", e);
            HashMap::new()
        });
        let avg_orders = avg_orders.unwrap_or_else(|e| {
            warn!("Order analytics unavailable, assuming zero demand: {}", e);
            HashMap::new()
        });

        let (days_without_sales, revenue) = match sales {
            Ok(sales) => (
                days_without_sales(&sales, &item_ids, today, self.config.no_sales_ceiling_days),
                revenue_by_item(&sales, date_from),
            ),
            Err(e) => {
                warn!("Sales history unavailable, using the no-data ceiling: {}", e);
                (HashMap::new(), HashMap::new())
            }
        };

        let mut stock = seller;
        for (item_id, quantity) in marketplace {
            *stock.entry(item_id).or_insert(0) += quantity;
        }

        MarketData {
            stock,
            avg_orders,
            days_without_sales,
            revenue,
        }
    }

    /// Submit in fixed-size batches; a batch is marked applied only as a whole
    async fn apply(&self, actions: &mut [PriceAction], cancel: &AtomicBool) -> usize {
        let timeout = self.config.submit_timeout();
        let mut applied = 0;

        for (index, batch) in actions.chunks_mut(self.config.batch_size.max(1)).enumerate() {
            if cancel.load(Ordering::SeqCst) {
                warn!("Stop requested, skipping remaining batches from batch {}", index + 1);
                break;
            }

            let updates: Vec<PriceUpdate> = batch.iter().map(PriceUpdate::from).collect();
            match tokio::time::timeout(timeout, self.writer.submit_batch(&updates)).await {
                Ok(Ok(upload_id)) => {
                    for action in batch.iter_mut() {
                        action.applied = true;
                    }
                    applied += batch.len();
                    info!(
                        "Batch {} accepted: {} items (upload {})",
                        index + 1,
                        batch.len(),
                        upload_id.as_deref().unwrap_or("-")
                    );
                }
                Ok(Err(e)) => {
                    error!("Batch {} rejected ({} items): {}", index + 1, batch.len(), e);
                }
                Err(_) => {
                    error!(
                        "Batch {} not applied ({} items): {}",
                        index + 1,
                        batch.len(),
                        AppError::Timeout(timeout)
                    );
                }
            }
        }

        applied
    }

    /// Human-readable report, one line per action
    pub fn summary(actions: &[PriceAction]) -> String {
        if actions.is_empty() {
            return NO_CHANGES_MESSAGE.to_string();
        }

        let mut lines = Vec::with_capacity(actions.len() + 1);
        lines.push(format!("Price changes ({} items):", actions.len()));
        for action in actions {
            let status = if action.applied { "applied" } else { "pending" };
            lines.push(format!(
                "  [{}] {} (item {}): price {} -> {}, discount {}% -> {}% | {} | {}",
                status,
                action.vendor_code,
                action.item_id,
                action.old_price.round(),
                action.new_price,
                action.old_discount,
                action.new_discount,
                action.reason,
                action.strategy_name
            ));
        }
        lines.join("\n")
    }
}

fn check_cancel(cancel: &AtomicBool) -> AppResult<()> {
    if cancel.load(Ordering::SeqCst) {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

fn build_contexts(items: &[ProductItem], data: &MarketData, ceiling: i64) -> Vec<PricingContext> {
    items
        .iter()
        .filter(|item| {
            if item.price <= Decimal::ZERO {
                debug!("Skipping item {}: no known price", item.item_id);
                return false;
            }
            true
        })
        .map(|item| PricingContext {
            item_id: item.item_id,
            vendor_code: item.vendor_code.clone(),
            title: item.display_title(),
            current_price: item.price,
            current_discount: item.discount,
            stock_total: data.stock.get(&item.item_id).copied().unwrap_or(0),
            avg_daily_orders: data.avg_orders.get(&item.item_id).copied().unwrap_or(0.0),
            days_without_sales: data
                .days_without_sales
                .get(&item.item_id)
                .copied()
                .unwrap_or(ceiling),
            revenue: data.revenue.get(&item.item_id).copied().unwrap_or(Decimal::ZERO),
        })
        .collect()
}

/// Days since the last real sale per item, or `ceiling` when there is none
///
/// The ceiling lumps "never sold" together with "sold long ago".
pub fn days_without_sales(
    sales: &[SaleRecord],
    item_ids: &[i64],
    today: NaiveDate,
    ceiling: i64,
) -> HashMap<i64, i64> {
    let mut last_sale: HashMap<i64, NaiveDate> = HashMap::new();
    for sale in sales.iter().filter(|s| s.counts_as_sale()) {
        last_sale
            .entry(sale.item_id)
            .and_modify(|date| *date = (*date).max(sale.date))
            .or_insert(sale.date);
    }

    item_ids
        .iter()
        .map(|item_id| {
            let days = match last_sale.get(item_id) {
                Some(date) => (today - *date).num_days().max(0),
                None => ceiling,
            };
            (*item_id, days)
        })
        .collect()
}

/// Amount payable to the seller per item since `date_from`
pub fn revenue_by_item(sales: &[SaleRecord], date_from: NaiveDate) -> HashMap<i64, Decimal> {
    let mut revenue: HashMap<i64, Decimal> = HashMap::new();
    for sale in sales.iter().filter(|s| s.counts_as_sale() && s.date >= date_from) {
        *revenue.entry(sale.item_id).or_insert(Decimal::ZERO) += sale.amount_payable;
    }
    revenue
}
