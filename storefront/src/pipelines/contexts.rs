// storefront/src/pipelines/contexts.rs

//! Data carried through each pipeline run. Handlers receive these wrapped in
//! `shopflow::ContextData`.

use crate::models::{CancelOutcome, CartItem, LineItem, Order, PaymentTransition, StockRequest};
use crate::services::{CheckoutRequest, PaymentSession};
use crate::state::AppState;
use serde_json::Value;

/// Where a purchase stands in the reservation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationState {
  Initiated,
  StockChecked,
  Reserved,
  OrderCreated,
  PaymentSessionCreated,
  Paid,
  Cancelled,
}

/// Advisory stock check for a cart; nothing is reserved.
#[derive(Clone)]
pub struct CheckAvailabilityCtxData {
  pub app_state: AppState,
  pub cart: Vec<CartItem>,
  pub requests: Vec<StockRequest>,
  pub available: bool,
  pub state: ReservationState,
}

impl CheckAvailabilityCtxData {
  pub fn new(app_state: AppState, cart: Vec<CartItem>) -> Self {
    Self {
      app_state,
      cart,
      requests: Vec::new(),
      available: false,
      state: ReservationState::Initiated,
    }
  }
}

#[derive(Clone)]
pub struct PayCtxData {
  pub app_state: AppState,
  pub cart: Vec<CartItem>,
  pub fulfillment: Option<Value>,

  pub requests: Vec<StockRequest>,
  pub line_items: Vec<LineItem>,
  /// Set when the reservation was refused; the run then stops without side effects.
  pub short_products: Option<Vec<i64>>,
  pub order_id: Option<i64>,
  pub checkout_request: Option<CheckoutRequest>,
  pub session: Option<PaymentSession>,
  /// Guards against re-crediting the same reservation twice during compensation.
  pub stock_released: bool,
  pub state: ReservationState,
}

impl PayCtxData {
  pub fn new(app_state: AppState, cart: Vec<CartItem>, fulfillment: Option<Value>) -> Self {
    Self {
      app_state,
      cart,
      fulfillment,
      requests: Vec::new(),
      line_items: Vec::new(),
      short_products: None,
      order_id: None,
      checkout_request: None,
      session: None,
      stock_released: false,
      state: ReservationState::Initiated,
    }
  }
}

/// The payment provider reported success for `order_id`.
#[derive(Clone)]
pub struct PaymentConfirmedCtxData {
  pub app_state: AppState,
  pub order_id: i64,
  pub order: Option<Order>,
  pub transition: Option<PaymentTransition>,
  pub state: ReservationState,
}

impl PaymentConfirmedCtxData {
  pub fn new(app_state: AppState, order_id: i64) -> Self {
    Self {
      app_state,
      order_id,
      order: None,
      transition: None,
      state: ReservationState::PaymentSessionCreated,
    }
  }
}

/// The shopper abandoned the provider's checkout page for `order_id`.
#[derive(Clone)]
pub struct PaymentCancelledCtxData {
  pub app_state: AppState,
  pub order_id: i64,
  pub order: Option<Order>,
  pub outcome: Option<CancelOutcome>,
  pub state: ReservationState,
}

impl PaymentCancelledCtxData {
  pub fn new(app_state: AppState, order_id: i64) -> Self {
    Self {
      app_state,
      order_id,
      order: None,
      outcome: None,
      state: ReservationState::PaymentSessionCreated,
    }
  }
}
