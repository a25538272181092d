use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One proposed price change for one item
///
/// Identity fields are copied from the context so the journal keeps them
/// even after the catalog changes. Only `applied` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAction {
    pub item_id: i64,
    pub vendor_code: String,
    pub title: String,
    pub old_price: Decimal,
    pub old_discount: i32,
    /// Rounded to whole currency units
    pub new_price: Decimal,
    /// Clamped to 0..=95
    pub new_discount: i32,
    pub reason: String,
    pub strategy_name: String,
    /// Set once the batch carrying this action was accepted by the writer
    #[serde(default)]
    pub applied: bool,
}

/// Payload line sent to the write-side collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub item_id: i64,
    pub price: Decimal,
    pub discount: i32,
}

impl From<&PriceAction> for PriceUpdate {
    fn from(action: &PriceAction) -> Self {
        Self {
            item_id: action.item_id,
            price: action.new_price,
            discount: action.new_discount,
        }
    }
}
