use super::{make_action, percent, PricingStrategy};
use crate::models::{PriceAction, PricingContext};
use rust_decimal::Decimal;

/// Reprice on absolute stock level
///
/// Scarce stock gets a markup, excess stock gets extra discount. Stock
/// between the two thresholds is left alone.
#[derive(Debug, Clone)]
pub struct StockStrategy {
    pub low_threshold: i64,
    /// Fraction, 0.10 = +10%
    pub low_markup: Decimal,
    pub high_threshold: i64,
    /// Percentage points added to the discount
    pub high_discount: i32,
}

impl StockStrategy {
    pub fn new(low_threshold: i64, low_markup: Decimal, high_threshold: i64, high_discount: i32) -> Self {
        Self {
            low_threshold,
            low_markup,
            high_threshold,
            high_discount,
        }
    }
}

impl Default for StockStrategy {
    fn default() -> Self {
        Self::new(10, Decimal::new(10, 2), 150, 5)
    }
}

impl PricingStrategy for StockStrategy {
    fn name(&self) -> &'static str {
        "StockStrategy"
    }

    fn evaluate(&self, ctx: &PricingContext) -> Option<PriceAction> {
        if ctx.stock_total < self.low_threshold {
            let new_price = ctx.current_price * (Decimal::ONE + self.low_markup);
            let reason = format!(
                "Stock {} units < {} units -> markup +{}%",
                ctx.stock_total,
                self.low_threshold,
                percent(self.low_markup)
            );
            return make_action(self.name(), ctx, new_price, ctx.current_discount, reason);
        }

        if ctx.stock_total > self.high_threshold {
            let new_discount = ctx.current_discount + self.high_discount;
            let reason = format!(
                "Stock {} units > {} units -> discount +{}%",
                ctx.stock_total, self.high_threshold, self.high_discount
            );
            return make_action(self.name(), ctx, ctx.current_price, new_discount, reason);
        }

        None
    }
}
