// storefront/src/models/order.rs

use crate::models::line_item::LineItem;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, Type as SqlxType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "order_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Paid,
  Cancelled,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: i64,
  pub status: OrderStatus,
  #[sqlx(json)]
  pub line_items: Vec<LineItem>,
  /// Shipping/customer details exactly as the browser sent them.
  pub fulfillment: Option<Value>,
  pub payment_session_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Result of a payment-success notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransition {
  Paid,
  AlreadyPaid,
  /// The order had been cancelled (and its stock released) before the payment landed.
  ArrivedAfterCancellation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
  Cancelled,
  NotFound,
  AlreadyPaid,
  AlreadyCancelled,
}
