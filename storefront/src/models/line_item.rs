// storefront/src/models/line_item.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What was bought, at what price. Captured when stock is reserved and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
  pub product_id: i64,
  pub product_name: String,
  pub quantity: i32,
  pub unit_price: Decimal,
}
