use super::{make_action, percent, PricingStrategy};
use crate::models::{PriceAction, PricingContext};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

/// Hold a target margin after marketplace commission
///
/// `target = cost / (1 - target_margin - commission)`; the price moves to
/// the target only when it deviates by more than `tolerance`. Items missing
/// from the cost table are skipped.
#[derive(Debug, Clone)]
pub struct MarginStrategy {
    pub cost_prices: HashMap<i64, Decimal>,
    pub target_margin: Decimal,
    pub commission_rate: Decimal,
    pub tolerance: Decimal,
}

impl MarginStrategy {
    pub fn new(
        cost_prices: HashMap<i64, Decimal>,
        target_margin: Decimal,
        commission_rate: Decimal,
        tolerance: Decimal,
    ) -> Self {
        Self {
            cost_prices,
            target_margin,
            commission_rate,
            tolerance,
        }
    }

    /// Price that yields the target margin, `None` if the parameters leave no room
    pub fn target_price(&self, cost: Decimal) -> Option<Decimal> {
        let denominator = Decimal::ONE - self.target_margin - self.commission_rate;
        if denominator <= Decimal::ZERO {
            return None;
        }
        Some(cost / denominator)
    }
}

impl PricingStrategy for MarginStrategy {
    fn name(&self) -> &'static str {
        "MarginStrategy"
    }

    fn evaluate(&self, ctx: &PricingContext) -> Option<PriceAction> {
        let cost = *self.cost_prices.get(&ctx.item_id)?;

        if ctx.current_price <= Decimal::ZERO {
            return None;
        }

        let Some(target_price) = self.target_price(cost) else {
            warn!(
                "MarginStrategy: invalid parameters for item {} (target_margin={}, commission={})",
                ctx.item_id, self.target_margin, self.commission_rate
            );
            return None;
        };

        let deviation = (target_price - ctx.current_price).abs() / ctx.current_price;
        if deviation <= self.tolerance {
            return None;
        }

        let reason = format!(
            "Cost {}, target margin {}% -> target price {} (deviation {}%)",
            cost,
            percent(self.target_margin),
            target_price.round(),
            percent(deviation)
        );
        make_action(self.name(), ctx, target_price, ctx.current_discount, reason)
    }
}
