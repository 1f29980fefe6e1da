// storefront/src/models/cart_item.rs

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cart line as sent by the browser. Only the id and quantity are trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
  #[serde(alias = "id")]
  pub product_id: i64,
  #[serde(alias = "cart_quantity")]
  pub quantity: i64,
}

/// A validated request against the inventory ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRequest {
  pub product_id: i64,
  pub quantity: i32,
}

/// Rejects non-positive quantities and merges repeated product ids.
///
/// The result is sorted by product id, which is also the order the ledger locks rows in.
pub fn validate_cart(items: &[CartItem]) -> Result<Vec<StockRequest>> {
  merge_quantities(items.iter().map(|item| (item.product_id, item.quantity)))
}

/// The same rules for requests that reach the ledger without going through a cart.
pub fn normalize_requests(items: &[StockRequest]) -> Result<Vec<StockRequest>> {
  merge_quantities(items.iter().map(|req| (req.product_id, i64::from(req.quantity))))
}

fn merge_quantities(lines: impl Iterator<Item = (i64, i64)>) -> Result<Vec<StockRequest>> {
  let mut merged: BTreeMap<i64, i64> = BTreeMap::new();
  for (product_id, quantity) in lines {
    if quantity <= 0 {
      return Err(AppError::Validation(format!(
        "Quantity for product {} must be positive, got {}",
        product_id, quantity
      )));
    }
    let total = merged.entry(product_id).or_insert(0);
    *total = total
      .checked_add(quantity)
      .ok_or_else(|| AppError::Validation(format!("Quantity for product {} is too large", product_id)))?;
  }

  merged
    .into_iter()
    .map(|(product_id, quantity)| {
      let quantity = i32::try_from(quantity)
        .map_err(|_| AppError::Validation(format!("Quantity for product {} is too large", product_id)))?;
      Ok(StockRequest { product_id, quantity })
    })
    .collect()
}
