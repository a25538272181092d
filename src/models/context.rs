use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pricing-relevant snapshot of one catalog item, rebuilt on every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingContext {
    pub item_id: i64,
    pub vendor_code: String,
    pub title: String,
    /// Price before discount
    pub current_price: Decimal,
    /// Discount in percent, 0..=95
    pub current_discount: i32,
    /// Seller-held plus marketplace-held stock
    pub stock_total: i64,
    /// Average orders per day over the analysis window
    pub avg_daily_orders: f64,
    /// Consecutive days without a non-cancelled, non-returned sale
    pub days_without_sales: i64,
    /// Amount payable to the seller over the analysis window
    pub revenue: Decimal,
}

impl PricingContext {
    /// Price the buyer pays after the discount, to two decimals
    pub fn discounted_price(&self) -> Decimal {
        let share = Decimal::ONE - Decimal::from(self.current_discount) / Decimal::ONE_HUNDRED;
        (self.current_price * share).round_dp(2)
    }

    /// How many days the current stock lasts at the current order rate
    ///
    /// Zero when out of stock, infinite when stocked but not selling,
    /// otherwise the ratio rounded to one decimal.
    pub fn days_of_stock(&self) -> f64 {
        if self.stock_total <= 0 {
            return 0.0;
        }
        if self.avg_daily_orders <= 0.0 {
            return f64::INFINITY;
        }
        let days = self.stock_total as f64 / self.avg_daily_orders;
        (days * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(stock_total: i64, avg_daily_orders: f64) -> PricingContext {
        PricingContext {
            item_id: 1,
            vendor_code: "SKU-1".to_string(),
            title: "Mug".to_string(),
            current_price: Decimal::new(1000, 0),
            current_discount: 15,
            stock_total,
            avg_daily_orders,
            days_without_sales: 0,
            revenue: Decimal::ZERO,
        }
    }

    #[test]
    fn test_discounted_price() {
        assert_eq!(context(10, 1.0).discounted_price(), Decimal::new(850, 0));

        let mut odd = context(10, 1.0);
        odd.current_price = Decimal::new(99999, 2);
        odd.current_discount = 33;
        assert_eq!(odd.discounted_price(), Decimal::new(66999, 2));
    }

    #[test]
    fn test_days_of_stock_policy() {
        assert_eq!(context(0, 5.0).days_of_stock(), 0.0);
        assert_eq!(context(-3, 5.0).days_of_stock(), 0.0);
        assert!(context(100, 0.0).days_of_stock().is_infinite());
        assert_eq!(context(100, 10.0).days_of_stock(), 10.0);
        assert_eq!(context(100, 0.5).days_of_stock(), 200.0);
        assert_eq!(context(10, 3.0).days_of_stock(), 3.3);
    }
}
