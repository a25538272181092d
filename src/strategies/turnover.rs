use super::{make_action, percent, PricingStrategy};
use crate::models::{PriceAction, PricingContext};
use rust_decimal::Decimal;

/// Reprice on days of stock (stock / daily orders)
///
/// 100 units at 10 orders/day is 10 days and selling out; 100 units at
/// 0.5 orders/day is 200 days and sitting on the shelf.
#[derive(Debug, Clone)]
pub struct TurnoverStrategy {
    pub understock_days: f64,
    pub markup: Decimal,
    pub overstock_days: f64,
    pub discount_delta: i32,
    pub max_discount: i32,
}

impl TurnoverStrategy {
    pub fn new(
        understock_days: f64,
        markup: Decimal,
        overstock_days: f64,
        discount_delta: i32,
        max_discount: i32,
    ) -> Self {
        Self {
            understock_days,
            markup,
            overstock_days,
            discount_delta,
            max_discount,
        }
    }
}

impl Default for TurnoverStrategy {
    fn default() -> Self {
        Self::new(7.0, Decimal::new(10, 2), 60.0, 7, 60)
    }
}

impl PricingStrategy for TurnoverStrategy {
    fn name(&self) -> &'static str {
        "TurnoverStrategy"
    }

    fn evaluate(&self, ctx: &PricingContext) -> Option<PriceAction> {
        let days = ctx.days_of_stock();

        // Out of stock: nothing to reprice on this signal
        if days == 0.0 {
            return None;
        }

        if days < self.understock_days {
            let new_price = ctx.current_price * (Decimal::ONE + self.markup);
            let reason = format!(
                "Stock for {:.1} days < {} days ({} units / {:.1} orders/day) -> markup +{}%",
                days,
                self.understock_days,
                ctx.stock_total,
                ctx.avg_daily_orders,
                percent(self.markup)
            );
            return make_action(self.name(), ctx, new_price, ctx.current_discount, reason);
        }

        // Stocked but not selling reports infinite days; that is no turnover signal
        if days.is_finite() && days > self.overstock_days {
            let new_discount = (ctx.current_discount + self.discount_delta).min(self.max_discount);
            let reason = format!(
                "Stock for {:.1} days > {} days ({} units / {:.1} orders/day) -> discount +{}%",
                days, self.overstock_days, ctx.stock_total, ctx.avg_daily_orders, self.discount_delta
            );
            return make_action(self.name(), ctx, ctx.current_price, new_discount, reason);
        }

        None
    }
}
