// tests/reservation_flow_tests.rs
mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::*;
use serde_json::Value;
use serial_test::serial;
use shopflow::{ContextData, FlowRegistry, PipelineResult};
use std::sync::Arc;
use storefront::models::{CancelOutcome, LineItem, Order, OrderStatus, PaymentTransition};
use storefront::pipelines::{
  register_all_pipelines, CheckAvailabilityCtxData, PayCtxData, PaymentCancelledCtxData, PaymentConfirmedCtxData,
  ReservationState,
};
use storefront::services::{CheckoutRequest, PaymentGateway, PaymentSession, UrlSigner};
use storefront::store::{MemoryStore, OrderStore};
use storefront::{AppError, AppState};

/// Settles the order behind the shopper's back, then reports a provider failure.
struct SettlingGateway {
  store: Arc<MemoryStore>,
  pay_instead: bool,
}

#[async_trait]
impl PaymentGateway for SettlingGateway {
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<PaymentSession, AppError> {
    if self.pay_instead {
      self.store.mark_paid(request.order_id).await?;
    } else {
      assert_eq!(self.store.cancel(request.order_id).await?, CancelOutcome::Cancelled);
    }
    Err(AppError::PaymentGateway("timeout".to_string()))
  }

  fn public_key(&self) -> &str {
    "pk_test"
  }
}

/// Order store whose cancellations always fail.
struct StuckOrders(Arc<MemoryStore>);

#[async_trait]
impl OrderStore for StuckOrders {
  async fn create_pending(&self, line_items: &[LineItem], fulfillment: Option<Value>) -> Result<i64, AppError> {
    self.0.create_pending(line_items, fulfillment).await
  }
  async fn find(&self, order_id: i64) -> Result<Option<Order>, AppError> {
    self.0.find(order_id).await
  }
  async fn list(&self) -> Result<Vec<Order>, AppError> {
    self.0.list().await
  }
  async fn attach_payment_session(&self, order_id: i64, session_id: &str) -> Result<(), AppError> {
    self.0.attach_payment_session(order_id, session_id).await
  }
  async fn mark_paid(&self, order_id: i64) -> Result<PaymentTransition, AppError> {
    self.0.mark_paid(order_id).await
  }
  async fn cancel(&self, _order_id: i64) -> Result<CancelOutcome, AppError> {
    Err(AppError::Internal("connection reset".to_string()))
  }
  async fn stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<i64>, AppError> {
    self.0.stale_pending(older_than).await
  }
}

fn state_with(store: Arc<MemoryStore>, orders: Arc<dyn OrderStore>, gateway: Arc<dyn PaymentGateway>) -> AppState {
  let config = Arc::new(test_config());
  let flows = Arc::new(FlowRegistry::<AppError>::new());
  register_all_pipelines(&flows);
  AppState {
    ledger: store.clone(),
    orders,
    catalog: store,
    gateway,
    flows,
    signer: Arc::new(UrlSigner::new(&config.url_signing_secret).unwrap()),
    config,
  }
}

async fn pay_with(state: &AppState, items: Vec<storefront::models::CartItem>) -> Result<PipelineResult, AppError> {
  let ctx = ContextData::new(PayCtxData::new(state.clone(), items, None));
  state.flows.run(ctx).await
}

#[tokio::test]
#[serial]
async fn test_pay_reserves_stock_and_opens_a_session() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;

  let (result, ctx) = shop.pay(vec![item(mug, 2)]).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(shop.stock_of(mug).await, 3);

  let guard = ctx.read();
  assert_eq!(guard.state, ReservationState::PaymentSessionCreated);
  let order_id = guard.order_id.unwrap();
  let session = guard.session.clone().unwrap();
  drop(guard);

  let order = shop.store.find(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.line_items[0].product_id, mug);
  assert_eq!(order.line_items[0].quantity, 2);
  assert_eq!(order.line_items[0].unit_price, dec("9.99"));
  assert_eq!(order.payment_session_id.as_deref(), Some(session.id.as_str()));
  assert_eq!(order.fulfillment.unwrap()["name"], "Ada");

  let request = shop.gateway.last_request().unwrap();
  assert_eq!(request.order_id, order_id);
  assert_eq!(request.currency, "usd");
  assert_eq!(request.line_items[0].unit_amount, 999);
  assert_eq!(request.total_minor_units().unwrap(), 1998);
  assert!(local_part(&request.success_url).starts_with(&format!("/successful_payment/{}?_exp=", order_id)));
  assert!(local_part(&request.cancel_url).starts_with(&format!("/cancelled_payment/{}?_exp=", order_id)));
}

#[tokio::test]
#[serial]
async fn test_duplicate_cart_lines_are_merged() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;

  let (result, ctx) = shop.pay(vec![item(mug, 1), item(mug, 2)]).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().line_items.len(), 1);
  assert_eq!(ctx.read().line_items[0].quantity, 3);
  assert_eq!(shop.stock_of(mug).await, 2);
}

#[tokio::test]
#[serial]
async fn test_insufficient_stock_stops_without_side_effects() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let tote = shop.add_product("Tote", "14.50", 1).await;

  let (result, ctx) = shop.pay(vec![item(mug, 1), item(tote, 2)]).await;
  assert_eq!(result.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().short_products, Some(vec![tote]));
  assert!(ctx.read().order_id.is_none());
  assert_eq!(shop.stock_of(mug).await, 5);
  assert_eq!(shop.stock_of(tote).await, 1);
  assert!(shop.store.list().await.unwrap().is_empty());
  assert!(shop.gateway.requests().is_empty());
}

#[tokio::test]
#[serial]
async fn test_invalid_carts_are_rejected() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;

  let (empty, _) = shop.pay(vec![]).await;
  assert!(matches!(empty, Err(AppError::Validation(_))));

  let (zero, _) = shop.pay(vec![item(mug, 0)]).await;
  assert!(matches!(zero, Err(AppError::Validation(_))));

  let (unknown, _) = shop.pay(vec![item(mug, 1), item(9_999, 1)]).await;
  assert!(matches!(unknown, Err(AppError::UnknownProduct(9_999))));

  assert_eq!(shop.stock_of(mug).await, 5);
  assert!(shop.store.list().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_gateway_failure_cancels_order_and_restores_stock() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  shop.gateway.set_failing(true);

  let (result, ctx) = shop.pay(vec![item(mug, 2)]).await;
  assert!(matches!(result, Err(AppError::PaymentGateway(_))));
  assert_eq!(shop.stock_of(mug).await, 5);

  let guard = ctx.read();
  assert!(guard.stock_released);
  assert_eq!(guard.state, ReservationState::Cancelled);
  let order_id = guard.order_id.unwrap();
  drop(guard);

  let order = shop.store.find(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
#[serial]
async fn test_successful_payment_marks_order_paid_and_keeps_stock() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let (_, pay_ctx) = shop.pay(vec![item(mug, 2)]).await;
  let order_id = pay_ctx.read().order_id.unwrap();

  for expected in [PaymentTransition::Paid, PaymentTransition::AlreadyPaid] {
    let ctx = ContextData::new(PaymentConfirmedCtxData::new(shop.state.clone(), order_id));
    assert_eq!(shop.state.flows.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
    assert_eq!(ctx.read().transition, Some(expected));
    assert_eq!(ctx.read().state, ReservationState::Paid);
  }

  let order = shop.store.find(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Paid);
  assert_eq!(shop.stock_of(mug).await, 3);
}

#[tokio::test]
#[serial]
async fn test_cancelled_payment_restores_stock() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let (_, pay_ctx) = shop.pay(vec![item(mug, 2)]).await;
  let order_id = pay_ctx.read().order_id.unwrap();

  let ctx = ContextData::new(PaymentCancelledCtxData::new(shop.state.clone(), order_id));
  shop.state.flows.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().state, ReservationState::Cancelled);
  assert_eq!(shop.stock_of(mug).await, 5);

  // The provider may redirect twice; the second visit must not credit again.
  let again = ContextData::new(PaymentCancelledCtxData::new(shop.state.clone(), order_id));
  shop.state.flows.run(again).await.unwrap();
  assert_eq!(shop.stock_of(mug).await, 5);
}

#[tokio::test]
#[serial]
async fn test_callbacks_for_unknown_orders_stop_quietly() {
  let shop = TestShop::new();

  let confirmed = ContextData::new(PaymentConfirmedCtxData::new(shop.state.clone(), 404));
  assert_eq!(shop.state.flows.run(confirmed.clone()).await.unwrap(), PipelineResult::Stopped);
  assert!(confirmed.read().transition.is_none());

  let cancelled = ContextData::new(PaymentCancelledCtxData::new(shop.state.clone(), 404));
  assert_eq!(shop.state.flows.run(cancelled).await.unwrap(), PipelineResult::Stopped);
}

#[tokio::test]
#[serial]
async fn test_availability_check_does_not_reserve() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 2).await;

  let ctx = ContextData::new(CheckAvailabilityCtxData::new(shop.state.clone(), vec![item(mug, 2)]));
  shop.state.flows.run(ctx.clone()).await.unwrap();
  assert!(ctx.read().available);
  assert_eq!(shop.stock_of(mug).await, 2);

  let ctx = ContextData::new(CheckAvailabilityCtxData::new(shop.state.clone(), vec![item(mug, 3)]));
  shop.state.flows.run(ctx.clone()).await.unwrap();
  assert!(!ctx.read().available);

  let empty = ContextData::new(CheckAvailabilityCtxData::new(shop.state.clone(), vec![]));
  shop.state.flows.run(empty.clone()).await.unwrap();
  assert!(empty.read().available);
}

#[tokio::test]
#[serial]
async fn test_order_cancelled_during_payment_is_credited_once() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let gateway = Arc::new(SettlingGateway {
    store: shop.store.clone(),
    pay_instead: false,
  });
  let state = state_with(shop.store.clone(), shop.store.clone(), gateway);

  let result = pay_with(&state, vec![item(mug, 2)]).await;
  assert!(matches!(result, Err(AppError::PaymentGateway(_))));
  assert_eq!(shop.stock_of(mug).await, 5);
  let orders = shop.store.list().await.unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0].status, OrderStatus::Cancelled);
}

#[tokio::test]
#[serial]
async fn test_order_paid_during_failed_session_keeps_its_stock() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let gateway = Arc::new(SettlingGateway {
    store: shop.store.clone(),
    pay_instead: true,
  });
  let state = state_with(shop.store.clone(), shop.store.clone(), gateway);

  assert!(pay_with(&state, vec![item(mug, 2)]).await.is_err());
  assert_eq!(shop.stock_of(mug).await, 3);
  assert_eq!(shop.store.list().await.unwrap()[0].status, OrderStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_failed_cancellation_leaves_stock_with_the_pending_order() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  shop.gateway.set_failing(true);
  let state = state_with(
    shop.store.clone(),
    Arc::new(StuckOrders(shop.store.clone())),
    shop.gateway.clone(),
  );

  assert!(matches!(pay_with(&state, vec![item(mug, 2)]).await, Err(AppError::PaymentGateway(_))));
  // The order still holds its units until the sweeper gets to it.
  assert_eq!(shop.stock_of(mug).await, 3);
  let orders = shop.store.list().await.unwrap();
  assert_eq!(orders[0].status, OrderStatus::Pending);

  let swept = storefront::sweeper::sweep_abandoned_orders(shop.store.as_ref(), Utc::now() + chrono::Duration::seconds(1))
    .await
    .unwrap();
  assert_eq!(swept, 1);
  assert_eq!(shop.stock_of(mug).await, 5);
}

#[tokio::test]
#[serial]
async fn test_order_total_beyond_range_is_rejected_and_compensated() {
  let shop = TestShop::new();
  let vault = shop.add_product("Vault", "99999999.99", 2_100_000_000).await;

  let (result, ctx) = shop.pay(vec![item(vault, 2_000_000_000)]).await;
  assert!(matches!(result, Err(AppError::Validation(_))));
  assert_eq!(shop.stock_of(vault).await, 2_100_000_000);
  assert!(shop.gateway.requests().is_empty());

  let order_id = ctx.read().order_id.unwrap();
  assert_eq!(shop.store.find(order_id).await.unwrap().unwrap().status, OrderStatus::Cancelled);
}
