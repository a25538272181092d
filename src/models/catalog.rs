use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Priced catalog entry as reported by the products provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub item_id: i64,
    #[serde(default)]
    pub vendor_code: String,
    #[serde(default)]
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: i32,
}

impl ProductItem {
    /// Title, falling back to the vendor code and then the item id
    pub fn display_title(&self) -> String {
        if !self.title.is_empty() {
            self.title.clone()
        } else if !self.vendor_code.is_empty() {
            self.vendor_code.clone()
        } else {
            self.item_id.to_string()
        }
    }
}

/// One raw sale line from the analytics provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub item_id: i64,
    pub date: NaiveDate,
    /// Amount the marketplace owes the seller for this sale
    pub amount_payable: Decimal,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub is_return: bool,
}

impl SaleRecord {
    /// Cancelled orders and returns do not count as sales
    pub fn counts_as_sale(&self) -> bool {
        !self.is_cancelled && !self.is_return
    }
}
