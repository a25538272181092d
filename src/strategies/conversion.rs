use super::{make_action, percent, PricingStrategy};
use crate::models::{PriceAction, PricingContext};
use rust_decimal::Decimal;

/// Reprice on sales velocity
///
/// A stocked item idle for `no_sales_days` gets more discount; an item
/// selling at `fast_threshold` orders/day or more gets a markup.
#[derive(Debug, Clone)]
pub struct ConversionStrategy {
    pub no_sales_days: i64,
    pub discount_delta: i32,
    pub max_discount: i32,
    pub fast_threshold: f64,
    pub fast_markup: Decimal,
}

impl ConversionStrategy {
    pub fn new(
        no_sales_days: i64,
        discount_delta: i32,
        max_discount: i32,
        fast_threshold: f64,
        fast_markup: Decimal,
    ) -> Self {
        Self {
            no_sales_days,
            discount_delta,
            max_discount,
            fast_threshold,
            fast_markup,
        }
    }
}

impl Default for ConversionStrategy {
    fn default() -> Self {
        Self::new(7, 5, 50, 5.0, Decimal::new(5, 2))
    }
}

impl PricingStrategy for ConversionStrategy {
    fn name(&self) -> &'static str {
        "ConversionStrategy"
    }

    fn evaluate(&self, ctx: &PricingContext) -> Option<PriceAction> {
        if ctx.days_without_sales >= self.no_sales_days && ctx.stock_total > 0 {
            let new_discount = (ctx.current_discount + self.discount_delta).min(self.max_discount);
            let reason = format!(
                "No sales for {} days -> discount +{}% (total {}%)",
                ctx.days_without_sales, self.discount_delta, new_discount
            );
            return make_action(self.name(), ctx, ctx.current_price, new_discount, reason);
        }

        if ctx.avg_daily_orders >= self.fast_threshold {
            let new_price = ctx.current_price * (Decimal::ONE + self.fast_markup);
            let reason = format!(
                "High demand: {:.1} orders/day -> markup +{}%",
                ctx.avg_daily_orders,
                percent(self.fast_markup)
            );
            return make_action(self.name(), ctx, new_price, ctx.current_discount, reason);
        }

        None
    }
}
