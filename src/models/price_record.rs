use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Journal timestamp layout, second precision, sortable as text
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Price history row as stored in the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: i64,
    pub item_id: i64,
    pub vendor_code: String,
    pub title: String,
    pub old_price: Decimal,
    pub old_discount: i32,
    pub new_price: Decimal,
    pub new_discount: i32,
    pub strategy_name: String,
    pub reason: String,
    /// The change was accepted by the price writer
    pub applied: bool,
    /// A rollback restored `old_price`/`old_discount`
    pub rolled_back: bool,
    pub created_at: NaiveDateTime,
}

/// Number of journal rows produced by one strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCount {
    pub strategy_name: String,
    pub count: i64,
}

/// Aggregate journal counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalStats {
    pub total: i64,
    pub applied: i64,
    pub rolled_back: i64,
    pub unique_items: i64,
    pub first_at: Option<NaiveDateTime>,
    pub last_at: Option<NaiveDateTime>,
    /// Most frequent strategy first
    pub by_strategy: Vec<StrategyCount>,
}
