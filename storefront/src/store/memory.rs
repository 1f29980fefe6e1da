// storefront/src/store/memory.rs

use super::{availability_error, Catalog, InventoryLedger, OrderStore};
use crate::errors::{AppError, Result};
use crate::models::{
  normalize_requests, CancelOutcome, LineItem, Order, OrderStatus, PaymentTransition, Product, ProductDraft,
  ProductEdit, StockRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{instrument, warn};

#[derive(Default)]
struct Tables {
  products: BTreeMap<i64, Product>,
  orders: BTreeMap<i64, Order>,
  last_product_id: i64,
  last_order_id: i64,
}

impl Tables {
  fn credit(&mut self, line_items: &[LineItem]) {
    for line in line_items {
      match self.products.get_mut(&line.product_id) {
        Some(product) => product.quantity = product.quantity.saturating_add(line.quantity),
        None => warn!(product_id = line.product_id, quantity = line.quantity, "Released stock for a deleted product."),
      }
    }
  }
}

/// All tables behind one mutex, so a reservation or cancellation is a single critical section.
#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl InventoryLedger for MemoryStore {
  async fn check_availability(&self, items: &[StockRequest]) -> Result<bool> {
    let items = normalize_requests(items)?;
    let tables = self.tables.lock();
    let verdict = availability_error(&items, |id| tables.products.get(&id).map(|p| p.quantity));
    Ok(verdict.is_none())
  }

  #[instrument(name = "MemoryStore::reserve", skip_all, fields(items = items.len()), err(Display))]
  async fn reserve(&self, items: &[StockRequest]) -> Result<Vec<LineItem>> {
    // One request per product, so each is checked against the stock it will actually draw from.
    let items = normalize_requests(items)?;
    let mut tables = self.tables.lock();
    if let Some(err) = availability_error(&items, |id| tables.products.get(&id).map(|p| p.quantity)) {
      return Err(err);
    }

    let mut line_items = Vec::with_capacity(items.len());
    for item in &items {
      let product = tables
        .products
        .get_mut(&item.product_id)
        .ok_or(AppError::UnknownProduct(item.product_id))?;
      product.quantity -= item.quantity;
      line_items.push(LineItem {
        product_id: product.id,
        product_name: product.name.clone(),
        quantity: item.quantity,
        unit_price: product.price,
      });
    }
    Ok(line_items)
  }

  async fn release(&self, line_items: &[LineItem]) -> Result<()> {
    self.tables.lock().credit(line_items);
    Ok(())
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn create_pending(&self, line_items: &[LineItem], fulfillment: Option<Value>) -> Result<i64> {
    let mut tables = self.tables.lock();
    tables.last_order_id += 1;
    let id = tables.last_order_id;
    let now = Utc::now();
    tables.orders.insert(
      id,
      Order {
        id,
        status: OrderStatus::Pending,
        line_items: line_items.to_vec(),
        fulfillment,
        payment_session_id: None,
        created_at: now,
        updated_at: now,
      },
    );
    Ok(id)
  }

  async fn find(&self, order_id: i64) -> Result<Option<Order>> {
    Ok(self.tables.lock().orders.get(&order_id).cloned())
  }

  async fn list(&self) -> Result<Vec<Order>> {
    Ok(self.tables.lock().orders.values().cloned().collect())
  }

  async fn attach_payment_session(&self, order_id: i64, session_id: &str) -> Result<()> {
    let mut tables = self.tables.lock();
    let order = tables.orders.get_mut(&order_id).ok_or(AppError::OrderNotFound(order_id))?;
    order.payment_session_id = Some(session_id.to_string());
    order.updated_at = Utc::now();
    Ok(())
  }

  async fn mark_paid(&self, order_id: i64) -> Result<PaymentTransition> {
    let mut tables = self.tables.lock();
    let order = tables.orders.get_mut(&order_id).ok_or(AppError::OrderNotFound(order_id))?;
    let transition = match order.status {
      OrderStatus::Pending => {
        order.status = OrderStatus::Paid;
        order.updated_at = Utc::now();
        PaymentTransition::Paid
      }
      OrderStatus::Paid => PaymentTransition::AlreadyPaid,
      OrderStatus::Cancelled => PaymentTransition::ArrivedAfterCancellation,
    };
    Ok(transition)
  }

  async fn cancel(&self, order_id: i64) -> Result<CancelOutcome> {
    let mut tables = self.tables.lock();
    let Some(order) = tables.orders.get_mut(&order_id) else {
      return Ok(CancelOutcome::NotFound);
    };
    let line_items = match order.status {
      OrderStatus::Paid => return Ok(CancelOutcome::AlreadyPaid),
      OrderStatus::Cancelled => return Ok(CancelOutcome::AlreadyCancelled),
      OrderStatus::Pending => {
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        order.line_items.clone()
      }
    };
    tables.credit(&line_items);
    Ok(CancelOutcome::Cancelled)
  }

  async fn stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<i64>> {
    let tables = self.tables.lock();
    let stale = tables
      .orders
      .values()
      .filter(|o| o.status == OrderStatus::Pending && o.created_at < older_than)
      .map(|o| o.id)
      .collect();
    Ok(stale)
  }
}

#[async_trait]
impl Catalog for MemoryStore {
  async fn search(&self, query: Option<&str>) -> Result<Vec<Product>> {
    let needle = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
    let tables = self.tables.lock();
    let matches = tables
      .products
      .values()
      .filter(|p| match &needle {
        None => true,
        Some(needle) => {
          p.name.to_lowercase().contains(needle.as_str())
            || p.description.as_deref().map_or(false, |d| d.to_lowercase().contains(needle.as_str()))
        }
      })
      .cloned()
      .collect();
    Ok(matches)
  }

  async fn get(&self, product_id: i64) -> Result<Option<Product>> {
    Ok(self.tables.lock().products.get(&product_id).cloned())
  }

  async fn add(&self, draft: ProductDraft) -> Result<Product> {
    let mut tables = self.tables.lock();
    tables.last_product_id += 1;
    let product = Product {
      id: tables.last_product_id,
      name: draft.name,
      price: draft.price,
      quantity: draft.quantity,
      description: draft.description,
      image: draft.image,
    };
    tables.products.insert(product.id, product.clone());
    Ok(product)
  }

  async fn delete(&self, product_id: i64) -> Result<bool> {
    Ok(self.tables.lock().products.remove(&product_id).is_some())
  }

  async fn edit(&self, product_id: i64, edit: &ProductEdit) -> Result<Product> {
    let mut tables = self.tables.lock();
    let product = tables
      .products
      .get_mut(&product_id)
      .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;
    edit.apply(product);
    Ok(product.clone())
  }

  async fn set_image(&self, product_id: i64, image: String) -> Result<()> {
    let mut tables = self.tables.lock();
    let product = tables
      .products
      .get_mut(&product_id)
      .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;
    product.image = Some(image);
    Ok(())
  }
}
