mod helpers;

use autoprice::config::{parse_season_periods, StrategyConfig};
use autoprice::error::AppError;
use autoprice::models::*;
use autoprice::strategies::*;
use helpers::*;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Unit tests for strategy policies
#[test]
fn test_turnover_never_acts_on_empty_stock() {
    let strategy = TurnoverStrategy::default();
    for avg in [0.0, 0.5, 3.0, 40.0] {
        for days in [0, 10, 30] {
            assert!(strategy.evaluate(&context(0, avg, days)).is_none());
        }
    }
}

#[test]
fn test_no_demand_means_infinite_cover_and_no_turnover_signal() {
    for stock in [1, 50, 5000] {
        let ctx = context(stock, 0.0, 0);
        assert!(ctx.days_of_stock().is_infinite());
        assert!(TurnoverStrategy::default().evaluate(&ctx).is_none());
    }
}

#[test]
fn test_stock_strategy_is_idempotent() {
    let strategy = StockStrategy::default();
    let ctx = context(5, 1.0, 0);
    assert_eq!(strategy.evaluate(&ctx), strategy.evaluate(&ctx));
}

#[test]
fn test_noop_proposals_are_suppressed() {
    let mut ctx = context(50, 1.0, 0);
    ctx.current_price = Decimal::new(100040, 2);
    ctx.current_discount = 95;

    // Rounds back to the current price, and the discount is clamped to its current value
    assert!(make_action("test", &ctx, Decimal::new(100020, 2), 99, "noop".to_string()).is_none());
    assert!(make_action("test", &ctx, Decimal::from(1001), 95, "real".to_string()).is_some());
}

#[test]
fn test_scenario_low_stock_markup() {
    let strategy = StockStrategy::new(10, Decimal::new(10, 2), 150, 5);
    let mut ctx = context(5, 1.0, 0);
    ctx.current_discount = 12;

    let action = strategy.evaluate(&ctx).unwrap();
    assert_eq!(action.new_price, Decimal::from(1100));
    assert_eq!(action.new_discount, 12);
    assert!(action.reason.contains('5'));
    assert!(action.reason.contains("10"));
}

#[test]
fn test_scenario_high_stock_discount() {
    let strategy = StockStrategy::new(10, Decimal::new(10, 2), 150, 5);
    let action = strategy.evaluate(&context(300, 1.0, 0)).unwrap();
    assert_eq!(action.new_discount, 5);
    assert_eq!(action.new_price, Decimal::from(1000));
}

#[test]
fn test_scenario_no_sales_discount_is_capped() {
    let strategy = ConversionStrategy::new(7, 5, 50, 5.0, Decimal::new(5, 2));
    let mut ctx = context(20, 0.0, 10);
    ctx.current_discount = 48;

    let action = strategy.evaluate(&ctx).unwrap();
    assert_eq!(action.new_discount, 50);
}

#[test]
fn test_scenario_margin_target() {
    let costs = HashMap::from([(7, Decimal::from(500))]);
    let strategy = MarginStrategy::new(costs, Decimal::new(25, 2), Decimal::new(15, 2), Decimal::new(5, 2));
    let mut ctx = context(20, 1.0, 0);
    ctx.current_price = Decimal::from(900);

    let action = strategy.evaluate(&ctx).unwrap();
    assert_eq!(action.new_price, Decimal::from(833));
    assert_eq!(action.new_discount, ctx.current_discount);

    // Items without a known cost are left alone
    let mut other = ctx.clone();
    other.item_id = 8;
    assert!(strategy.evaluate(&other).is_none());
}

#[test]
fn test_margin_misconfiguration_is_not_fatal() {
    let costs = HashMap::from([(7, Decimal::from(500))]);
    let strategy = MarginStrategy::new(costs, Decimal::new(70, 2), Decimal::new(30, 2), Decimal::new(5, 2));
    assert!(strategy.evaluate(&context(20, 1.0, 0)).is_none());
}

#[test]
fn test_season_wraps_year_end() {
    let periods = parse_season_periods("new_year|12-20|01-10|10|1.0").unwrap();
    let strategy = SeasonStrategy::new(periods.clone()).as_of(date("2026-01-05"));

    let action = strategy.evaluate(&context(20, 1.0, 0)).unwrap();
    assert_eq!(action.new_discount, 10);
    assert!(action.reason.contains("new_year"));

    let summer = SeasonStrategy::new(periods).as_of(date("2026-07-01"));
    assert!(summer.evaluate(&context(20, 1.0, 0)).is_none());
}

#[test]
fn test_discount_always_within_bounds() {
    let strategy = StockStrategy::new(10, Decimal::new(10, 2), 150, 40);
    for current in [0, 30, 60, 94, 95] {
        let mut ctx = context(500, 1.0, 0);
        ctx.current_discount = current;
        if let Some(action) = strategy.evaluate(&ctx) {
            assert!((MIN_DISCOUNT..=MAX_DISCOUNT).contains(&action.new_discount));
        }
    }
}

// ============================================================================
// Strategy configuration
// ============================================================================

#[test]
fn test_build_strategies_in_configured_order() {
    let config = StrategyConfig {
        enabled: vec!["season".to_string(), "stock".to_string(), "turnover".to_string()],
        ..StrategyConfig::default()
    };

    let strategies = build_strategies(&config).unwrap();
    let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["SeasonStrategy", "StockStrategy", "TurnoverStrategy"]);
}

#[test]
fn test_unknown_strategy_is_a_config_error() {
    let config = StrategyConfig {
        enabled: vec!["stock".to_string(), "astrology".to_string()],
        ..StrategyConfig::default()
    };

    let err = build_strategies(&config).err().unwrap();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn test_margin_strategy_loads_cost_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("costs.json");
    std::fs::write(&path, r#"{"7": "500", "8": "120.50"}"#).unwrap();

    let costs = load_cost_prices(&path).unwrap();
    assert_eq!(costs[&8], Decimal::new(12050, 2));

    let config = StrategyConfig {
        enabled: vec!["margin".to_string()],
        margin_cost_prices_path: Some(path.display().to_string()),
        ..StrategyConfig::default()
    };
    let strategies = build_strategies(&config).unwrap();

    let mut ctx = context(20, 1.0, 0);
    ctx.current_price = Decimal::from(900);
    assert!(strategies[0].evaluate(&ctx).is_some());
}

#[test]
fn test_price_update_from_action() {
    let change = action(3, 1000, 1100, false);
    let update = PriceUpdate::from(&change);
    assert_eq!(update.item_id, 3);
    assert_eq!(update.price, Decimal::from(1100));
    assert_eq!(update.discount, 15);
}
