use super::{make_action, PricingStrategy};
use crate::models::{PriceAction, PricingContext, SeasonPeriod};
use chrono::{Local, NaiveDate};

/// Calendar promotions
///
/// Periods are checked in order; the first active period that actually
/// changes the price or discount wins.
#[derive(Debug, Clone)]
pub struct SeasonStrategy {
    pub periods: Vec<SeasonPeriod>,
    /// Evaluate as of this date instead of today
    as_of: Option<NaiveDate>,
}

impl SeasonStrategy {
    pub fn new(periods: Vec<SeasonPeriod>) -> Self {
        Self { periods, as_of: None }
    }

    /// Pin the evaluation date, e.g. to preview an upcoming sale
    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn evaluate_on(&self, ctx: &PricingContext, date: NaiveDate) -> Option<PriceAction> {
        self.periods
            .iter()
            .filter(|period| period.contains(date))
            .find_map(|period| {
                let new_price = ctx.current_price * period.price_mult;
                let new_discount = ctx.current_discount + period.discount_add;
                let reason = format!("Seasonal period \"{}\"", period.name);
                make_action(self.name(), ctx, new_price, new_discount, reason)
            })
    }
}

impl PricingStrategy for SeasonStrategy {
    fn name(&self) -> &'static str {
        "SeasonStrategy"
    }

    fn evaluate(&self, ctx: &PricingContext) -> Option<PriceAction> {
        self.evaluate_on(ctx, self.today())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::context;
    use rust_decimal::Decimal;

    fn periods() -> Vec<SeasonPeriod> {
        vec![
            SeasonPeriod::parse("Black Friday", "11-20", "12-05", 10, Decimal::ONE).unwrap(),
            SeasonPeriod::parse("New Year", "12-20", "01-05", 15, Decimal::ONE).unwrap(),
            SeasonPeriod::parse("Winter markup", "12-01", "02-28", 0, Decimal::new(110, 2)).unwrap(),
        ]
    }

    #[test]
    fn test_first_active_period_wins() {
        let date = NaiveDate::from_ymd_opt(2026, 12, 2).unwrap();
        let strategy = SeasonStrategy::new(periods()).as_of(date);

        let action = strategy.evaluate(&context(1000, 0, 10)).unwrap();
        assert_eq!(action.new_discount, 10);
        assert_eq!(action.new_price, Decimal::new(1000, 0));
        assert!(action.reason.contains("Black Friday"));
    }

    #[test]
    fn test_noop_period_falls_through_to_next() {
        let date = NaiveDate::from_ymd_opt(2027, 1, 3).unwrap();
        let strategy = SeasonStrategy::new(periods());

        // New Year cannot add discount at the cap, the winter markup still applies
        let action = strategy.evaluate_on(&context(1000, 95, 10), date).unwrap();
        assert_eq!(action.new_price, Decimal::new(1100, 0));
        assert_eq!(action.new_discount, 95);
        assert!(action.reason.contains("Winter markup"));
    }

    #[test]
    fn test_outside_all_periods() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let strategy = SeasonStrategy::new(periods());
        assert!(strategy.evaluate_on(&context(1000, 0, 10), date).is_none());
    }
}
