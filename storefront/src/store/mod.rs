// storefront/src/store/mod.rs

//! Storage seams. `PgStore` is the production engine; `MemoryStore` backs tests and
//! database-less demo runs. Both implement every trait, so one value can be shared
//! behind the three `Arc<dyn ...>` handles in `AppState`.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{CancelOutcome, LineItem, Order, PaymentTransition, Product, ProductDraft, ProductEdit, StockRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Authoritative per-product stock.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
  /// `false` iff a product is unknown or has less stock than requested. Read-only.
  async fn check_availability(&self, items: &[StockRequest]) -> Result<bool>;

  /// Decrements every item or none of them, returning the priced snapshot.
  ///
  /// Repeated product ids are merged into one line first; a non-positive quantity
  /// is a `Validation` error. Stock never goes below zero.
  ///
  /// Fails with `UnknownProduct` (first unknown id) before `InsufficientStock`
  /// (every short product id).
  async fn reserve(&self, items: &[StockRequest]) -> Result<Vec<LineItem>>;

  /// Puts reserved quantities back. Products deleted in the meantime are skipped.
  async fn release(&self, line_items: &[LineItem]) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn create_pending(&self, line_items: &[LineItem], fulfillment: Option<Value>) -> Result<i64>;

  async fn find(&self, order_id: i64) -> Result<Option<Order>>;

  /// Every order, ascending by id.
  async fn list(&self) -> Result<Vec<Order>>;

  async fn attach_payment_session(&self, order_id: i64, session_id: &str) -> Result<()>;

  /// `OrderNotFound` if the id is unknown. Paid is terminal.
  async fn mark_paid(&self, order_id: i64) -> Result<PaymentTransition>;

  /// Cancels a pending order and re-credits its line items atomically.
  async fn cancel(&self, order_id: i64) -> Result<CancelOutcome>;

  /// Ids of pending orders created before `older_than`.
  async fn stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<i64>>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
  /// Case-insensitive substring match on name or description; `None` lists everything.
  async fn search(&self, query: Option<&str>) -> Result<Vec<Product>>;

  async fn get(&self, product_id: i64) -> Result<Option<Product>>;

  async fn add(&self, draft: ProductDraft) -> Result<Product>;

  /// `true` if a product was removed.
  async fn delete(&self, product_id: i64) -> Result<bool>;

  async fn edit(&self, product_id: i64, edit: &ProductEdit) -> Result<Product>;

  async fn set_image(&self, product_id: i64, image: String) -> Result<()>;
}

/// Fills an empty catalog with a few demo products. Returns how many were added.
#[tracing::instrument(name = "seed_demo_catalog", skip_all, err(Display))]
pub async fn seed_demo_catalog(catalog: &dyn Catalog) -> Result<usize> {
  if !catalog.search(None).await?.is_empty() {
    tracing::info!("Catalog already has products, skipping seed.");
    return Ok(0);
  }
  let demo = [
    ("Ceramic mug", Decimal::new(999, 2), 25, "Holds 350ml of coffee."),
    ("Canvas tote", Decimal::new(1450, 2), 10, "Sturdy bag for groceries."),
    ("Notebook", Decimal::new(525, 2), 40, "A5, dotted pages."),
  ];
  for (name, price, quantity, description) in demo {
    catalog
      .add(ProductDraft {
        name: name.to_string(),
        price,
        quantity,
        description: Some(description.to_string()),
        image: None,
      })
      .await?;
  }
  tracing::info!(count = demo.len(), "Seeded demo catalog.");
  Ok(demo.len())
}

/// The `UnknownProduct`/`InsufficientStock` verdict shared by both engines.
///
/// `stock` yields the current quantity of a product, or `None` if it does not exist.
pub(crate) fn availability_error(
  items: &[StockRequest],
  stock: impl Fn(i64) -> Option<i32>,
) -> Option<crate::errors::AppError> {
  use crate::errors::AppError;

  let mut short = Vec::new();
  for item in items {
    match stock(item.product_id) {
      None => return Some(AppError::UnknownProduct(item.product_id)),
      Some(available) if available < item.quantity => short.push(item.product_id),
      Some(_) => {}
    }
  }
  (!short.is_empty()).then_some(AppError::InsufficientStock { product_ids: short })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::errors::AppError;

  fn req(product_id: i64, quantity: i32) -> StockRequest {
    StockRequest { product_id, quantity }
  }

  #[test]
  fn unknown_product_wins_over_short_stock() {
    let stock = |id: i64| match id {
      1 => Some(0),
      _ => None,
    };
    let err = availability_error(&[req(1, 5), req(2, 1), req(3, 1)], stock).unwrap();
    assert!(matches!(err, AppError::UnknownProduct(2)));
  }

  #[test]
  fn every_short_product_is_reported() {
    let stock = |id: i64| Some(if id == 2 { 10 } else { 1 });
    let err = availability_error(&[req(1, 2), req(2, 3), req(3, 4)], stock).unwrap();
    assert!(matches!(err, AppError::InsufficientStock { product_ids } if product_ids == vec![1, 3]));
    assert!(availability_error(&[req(2, 10)], stock).is_none());
  }
}
