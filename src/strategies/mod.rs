//! Pluggable repricing rules.
//!
//! Every strategy is a pure function of a [`PricingContext`]: no I/O, no
//! shared state. The engine asks them in priority order and keeps the first
//! proposal.

pub mod conversion;
pub mod margin;
pub mod season;
pub mod stock;
pub mod turnover;

pub use conversion::ConversionStrategy;
pub use margin::MarginStrategy;
pub use season::SeasonStrategy;
pub use stock::StockStrategy;
pub use turnover::TurnoverStrategy;

use crate::config::StrategyConfig;
use crate::error::{AppError, AppResult};
use crate::models::{PriceAction, PricingContext};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Marketplace bounds on the discount percentage
pub const MIN_DISCOUNT: i32 = 0;
pub const MAX_DISCOUNT: i32 = 95;

/// A single repricing rule
pub trait PricingStrategy: Send + Sync {
    /// Name recorded on every action this strategy produces
    fn name(&self) -> &'static str;

    /// Propose a change, or `None` when the current price is fine
    fn evaluate(&self, ctx: &PricingContext) -> Option<PriceAction>;
}

pub fn clamp_discount(discount: i32) -> i32 {
    discount.clamp(MIN_DISCOUNT, MAX_DISCOUNT)
}

/// Fraction as a whole percentage for reason strings (0.10 -> 10)
pub(crate) fn percent(fraction: Decimal) -> Decimal {
    (fraction * Decimal::ONE_HUNDRED).trunc()
}

/// Turn a raw proposal into an action
///
/// The price is rounded to whole currency units and the discount clamped
/// before comparing with the current values; a proposal that changes
/// neither yields `None`.
pub fn make_action(
    strategy_name: &str,
    ctx: &PricingContext,
    new_price: Decimal,
    new_discount: i32,
    reason: String,
) -> Option<PriceAction> {
    let new_price = new_price.round();
    let new_discount = clamp_discount(new_discount);

    if new_price <= Decimal::ZERO {
        warn!(
            "{}: refusing non-positive price {} for item {}",
            strategy_name, new_price, ctx.item_id
        );
        return None;
    }

    if new_price == ctx.current_price.round() && new_discount == ctx.current_discount {
        return None;
    }

    Some(PriceAction {
        item_id: ctx.item_id,
        vendor_code: ctx.vendor_code.clone(),
        title: ctx.title.clone(),
        old_price: ctx.current_price,
        old_discount: ctx.current_discount,
        new_price,
        new_discount,
        reason,
        strategy_name: strategy_name.to_string(),
        applied: false,
    })
}

/// Read a `{item_id: cost}` JSON object
pub fn load_cost_prices(path: impl AsRef<Path>) -> AppResult<HashMap<i64, Decimal>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let costs: HashMap<i64, Decimal> = serde_json::from_str(&raw)?;
    Ok(costs)
}

/// Instantiate the configured strategies in priority order
pub fn build_strategies(config: &StrategyConfig) -> AppResult<Vec<Box<dyn PricingStrategy>>> {
    let mut strategies: Vec<Box<dyn PricingStrategy>> = Vec::with_capacity(config.enabled.len());

    for name in &config.enabled {
        let strategy: Box<dyn PricingStrategy> = match name.as_str() {
            "stock" => Box::new(StockStrategy::new(
                config.stock_low_threshold,
                config.stock_low_markup,
                config.stock_high_threshold,
                config.stock_high_discount,
            )),
            "turnover" => Box::new(TurnoverStrategy::new(
                config.turnover_understock_days,
                config.turnover_markup,
                config.turnover_overstock_days,
                config.turnover_discount_delta,
                config.turnover_max_discount,
            )),
            "conversion" => Box::new(ConversionStrategy::new(
                config.conv_no_sales_days,
                config.conv_discount_delta,
                config.conv_max_discount,
                config.conv_fast_threshold,
                config.conv_fast_markup,
            )),
            "margin" => {
                let path = config.margin_cost_prices_path.as_ref().ok_or_else(|| {
                    AppError::Config("margin strategy requires MARGIN_COST_PRICES_PATH".to_string())
                })?;
                Box::new(MarginStrategy::new(
                    load_cost_prices(path)?,
                    config.margin_target,
                    config.margin_commission,
                    config.margin_tolerance,
                ))
            }
            "season" => Box::new(SeasonStrategy::new(config.season_periods.clone())),
            other => {
                return Err(AppError::Config(format!("Unknown strategy: {}", other)));
            }
        };
        strategies.push(strategy);
    }

    Ok(strategies)
}
