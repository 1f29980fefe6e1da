// storefront/src/store/postgres.rs

use super::{availability_error, Catalog, InventoryLedger, OrderStore};
use crate::errors::{AppError, Result};
use crate::models::{
  normalize_requests, CancelOutcome, LineItem, Order, OrderStatus, PaymentTransition, Product, ProductDraft,
  ProductEdit, StockRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

const PRODUCT_COLUMNS: &str = "id, name, price, quantity, description, image";
const ORDER_COLUMNS: &str = "id, status, line_items, fulfillment, payment_session_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  #[instrument(name = "PgStore::connect", skip_all, err(Display))]
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPool::connect(database_url).await?;
    info!("Successfully connected to the database.");
    Ok(Self::new(pool))
  }

  #[instrument(name = "PgStore::migrate", skip_all, err(Display))]
  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    info!("Database migrations applied.");
    Ok(())
  }
}

// Re-credits stock inside the caller's transaction, in ascending id order.
async fn credit_stock(conn: &mut PgConnection, line_items: &[LineItem]) -> Result<()> {
  let mut sorted: Vec<&LineItem> = line_items.iter().collect();
  sorted.sort_by_key(|line| line.product_id);
  for line in sorted {
    let updated = sqlx::query("UPDATE products SET quantity = quantity + $1 WHERE id = $2")
      .bind(line.quantity)
      .bind(line.product_id)
      .execute(&mut *conn)
      .await?;
    if updated.rows_affected() == 0 {
      warn!(product_id = line.product_id, quantity = line.quantity, "Released stock for a deleted product.");
    }
  }
  Ok(())
}

#[async_trait]
impl InventoryLedger for PgStore {
  #[instrument(name = "PgStore::check_availability", skip_all, fields(items = items.len()), err(Display))]
  async fn check_availability(&self, items: &[StockRequest]) -> Result<bool> {
    let items = normalize_requests(items)?;
    let ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
    let rows: Vec<(i64, i32)> = sqlx::query_as("SELECT id, quantity FROM products WHERE id = ANY($1)")
      .bind(&ids)
      .fetch_all(&self.pool)
      .await?;
    let stock: HashMap<i64, i32> = rows.into_iter().collect();
    Ok(availability_error(&items, |id| stock.get(&id).copied()).is_none())
  }

  #[instrument(name = "PgStore::reserve", skip_all, fields(items = items.len()), err(Display))]
  async fn reserve(&self, items: &[StockRequest]) -> Result<Vec<LineItem>> {
    let items = normalize_requests(items)?;
    let mut tx = self.pool.begin().await?;

    // Row locks are taken in ascending id order so concurrent reservations cannot deadlock.
    let ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
    let rows: Vec<(i64, String, Decimal, i32)> =
      sqlx::query_as("SELECT id, name, price, quantity FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
    let locked: HashMap<i64, (String, Decimal, i32)> =
      rows.into_iter().map(|(id, name, price, qty)| (id, (name, price, qty))).collect();

    if let Some(err) = availability_error(&items, |id| locked.get(&id).map(|(_, _, qty)| *qty)) {
      tx.rollback().await?;
      return Err(err);
    }

    let mut line_items = Vec::with_capacity(items.len());
    for item in &items {
      let updated = sqlx::query("UPDATE products SET quantity = quantity - $1 WHERE id = $2 AND quantity >= $1")
        .bind(item.quantity)
        .bind(item.product_id)
        .execute(&mut *tx)
        .await?;
      if updated.rows_affected() != 1 {
        tx.rollback().await?;
        return Err(AppError::InsufficientStock {
          product_ids: vec![item.product_id],
        });
      }
      let (name, price, _) = locked
        .get(&item.product_id)
        .ok_or(AppError::UnknownProduct(item.product_id))?;
      line_items.push(LineItem {
        product_id: item.product_id,
        product_name: name.clone(),
        quantity: item.quantity,
        unit_price: *price,
      });
    }

    tx.commit().await?;
    Ok(line_items)
  }

  #[instrument(name = "PgStore::release", skip_all, fields(lines = line_items.len()), err(Display))]
  async fn release(&self, line_items: &[LineItem]) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    credit_stock(&mut *tx, line_items).await?;
    tx.commit().await?;
    Ok(())
  }
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "PgStore::create_pending", skip_all, fields(lines = line_items.len()), err(Display))]
  async fn create_pending(&self, line_items: &[LineItem], fulfillment: Option<Value>) -> Result<i64> {
    let (id,): (i64,) =
      sqlx::query_as("INSERT INTO customer_orders (status, line_items, fulfillment) VALUES ($1, $2, $3) RETURNING id")
        .bind(OrderStatus::Pending)
        .bind(Json(line_items))
        .bind(fulfillment)
        .fetch_one(&self.pool)
        .await?;
    Ok(id)
  }

  async fn find(&self, order_id: i64) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM customer_orders WHERE id = $1", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(order)
  }

  async fn list(&self) -> Result<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM customer_orders ORDER BY id", ORDER_COLUMNS))
      .fetch_all(&self.pool)
      .await?;
    Ok(orders)
  }

  async fn attach_payment_session(&self, order_id: i64, session_id: &str) -> Result<()> {
    let updated = sqlx::query("UPDATE customer_orders SET payment_session_id = $1, updated_at = now() WHERE id = $2")
      .bind(session_id)
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    if updated.rows_affected() == 0 {
      return Err(AppError::OrderNotFound(order_id));
    }
    Ok(())
  }

  #[instrument(name = "PgStore::mark_paid", skip(self), err(Display))]
  async fn mark_paid(&self, order_id: i64) -> Result<PaymentTransition> {
    let mut tx = self.pool.begin().await?;
    let status: Option<(OrderStatus,)> = sqlx::query_as("SELECT status FROM customer_orders WHERE id = $1 FOR UPDATE")
      .bind(order_id)
      .fetch_optional(&mut *tx)
      .await?;

    let transition = match status {
      None => return Err(AppError::OrderNotFound(order_id)),
      Some((OrderStatus::Paid,)) => PaymentTransition::AlreadyPaid,
      Some((OrderStatus::Cancelled,)) => PaymentTransition::ArrivedAfterCancellation,
      Some((OrderStatus::Pending,)) => {
        sqlx::query("UPDATE customer_orders SET status = $1, updated_at = now() WHERE id = $2")
          .bind(OrderStatus::Paid)
          .bind(order_id)
          .execute(&mut *tx)
          .await?;
        PaymentTransition::Paid
      }
    };
    tx.commit().await?;
    Ok(transition)
  }

  #[instrument(name = "PgStore::cancel", skip(self), err(Display))]
  async fn cancel(&self, order_id: i64) -> Result<CancelOutcome> {
    let mut tx = self.pool.begin().await?;
    let row: Option<(OrderStatus, Json<Vec<LineItem>>)> =
      sqlx::query_as("SELECT status, line_items FROM customer_orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

    let outcome = match row {
      None => CancelOutcome::NotFound,
      Some((OrderStatus::Paid, _)) => CancelOutcome::AlreadyPaid,
      Some((OrderStatus::Cancelled, _)) => CancelOutcome::AlreadyCancelled,
      Some((OrderStatus::Pending, Json(line_items))) => {
        sqlx::query("UPDATE customer_orders SET status = $1, updated_at = now() WHERE id = $2")
          .bind(OrderStatus::Cancelled)
          .bind(order_id)
          .execute(&mut *tx)
          .await?;
        credit_stock(&mut *tx, &line_items).await?;
        CancelOutcome::Cancelled
      }
    };
    tx.commit().await?;
    Ok(outcome)
  }

  async fn stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<i64>> {
    let ids: Vec<(i64,)> =
      sqlx::query_as("SELECT id FROM customer_orders WHERE status = $1 AND created_at < $2 ORDER BY id")
        .bind(OrderStatus::Pending)
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
  }
}

// LIKE metacharacters in user input match literally.
fn like_pattern(query: &str) -> String {
  let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
  format!("%{}%", escaped)
}

#[async_trait]
impl Catalog for PgStore {
  #[instrument(name = "PgStore::search", skip(self), err(Display))]
  async fn search(&self, query: Option<&str>) -> Result<Vec<Product>> {
    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let products = match query {
      None => {
        sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS))
          .fetch_all(&self.pool)
          .await?
      }
      Some(q) => {
        sqlx::query_as::<_, Product>(&format!(
          "SELECT {} FROM products WHERE name ILIKE $1 OR description ILIKE $1 ORDER BY id",
          PRODUCT_COLUMNS
        ))
        .bind(like_pattern(q))
        .fetch_all(&self.pool)
        .await?
      }
    };
    Ok(products)
  }

  async fn get(&self, product_id: i64) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(product)
  }

  #[instrument(name = "PgStore::add_product", skip_all, fields(name = %draft.name), err(Display))]
  async fn add(&self, draft: ProductDraft) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>(&format!(
      "INSERT INTO products (name, price, quantity, description, image) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
      PRODUCT_COLUMNS
    ))
    .bind(draft.name)
    .bind(draft.price)
    .bind(draft.quantity)
    .bind(draft.description)
    .bind(draft.image)
    .fetch_one(&self.pool)
    .await?;
    Ok(product)
  }

  async fn delete(&self, product_id: i64) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
      .bind(product_id)
      .execute(&self.pool)
      .await?;
    Ok(deleted.rows_affected() > 0)
  }

  #[instrument(name = "PgStore::edit_product", skip(self), err(Display))]
  async fn edit(&self, product_id: i64, edit: &ProductEdit) -> Result<Product> {
    // The column name comes from the closed `ProductField` set, never from the request.
    let sql = format!(
      "UPDATE products SET {} = $1 WHERE id = $2 RETURNING {}",
      edit.field().column(),
      PRODUCT_COLUMNS
    );
    let query = sqlx::query_as::<_, Product>(&sql);
    let query = match edit {
      ProductEdit::Name(name) => query.bind(name.clone()),
      ProductEdit::Price(price) => query.bind(*price),
      ProductEdit::Quantity(quantity) => query.bind(*quantity),
      ProductEdit::Description(description) => query.bind(description.clone()),
    };
    query
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))
  }

  async fn set_image(&self, product_id: i64, image: String) -> Result<()> {
    let updated = sqlx::query("UPDATE products SET image = $1 WHERE id = $2")
      .bind(image)
      .bind(product_id)
      .execute(&self.pool)
      .await?;
    if updated.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("Product {} not found", product_id)));
    }
    Ok(())
  }
}
