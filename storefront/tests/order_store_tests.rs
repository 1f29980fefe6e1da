// tests/order_store_tests.rs
mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use serial_test::serial;
use storefront::models::{CancelOutcome, OrderStatus, PaymentTransition, StockRequest};
use storefront::store::{InventoryLedger, OrderStore};
use storefront::AppError;

async fn pending_order(shop: &TestShop, product_id: i64, quantity: i32) -> i64 {
  let lines = shop.store.reserve(&[StockRequest { product_id, quantity }]).await.unwrap();
  shop.store.create_pending(&lines, None).await.unwrap()
}

#[tokio::test]
#[serial]
async fn test_created_order_is_pending_with_its_lines() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let order_id = pending_order(&shop, mug, 2).await;

  let order = shop.store.find(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.line_items.len(), 1);
  assert_eq!(order.line_items[0].quantity, 2);
  assert!(order.payment_session_id.is_none());

  shop.store.attach_payment_session(order_id, "cs_123").await.unwrap();
  let order = shop.store.find(order_id).await.unwrap().unwrap();
  assert_eq!(order.payment_session_id.as_deref(), Some("cs_123"));
}

#[tokio::test]
#[serial]
async fn test_mark_paid_is_idempotent() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let order_id = pending_order(&shop, mug, 1).await;

  assert_eq!(shop.store.mark_paid(order_id).await.unwrap(), PaymentTransition::Paid);
  assert_eq!(shop.store.mark_paid(order_id).await.unwrap(), PaymentTransition::AlreadyPaid);
  assert_eq!(shop.stock_of(mug).await, 4);
  assert_eq!(shop.store.cancel(order_id).await.unwrap(), CancelOutcome::AlreadyPaid);
  assert_eq!(shop.stock_of(mug).await, 4);
}

#[tokio::test]
#[serial]
async fn test_cancel_recredits_stock_exactly_once() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let order_id = pending_order(&shop, mug, 3).await;
  assert_eq!(shop.stock_of(mug).await, 2);

  assert_eq!(shop.store.cancel(order_id).await.unwrap(), CancelOutcome::Cancelled);
  assert_eq!(shop.stock_of(mug).await, 5);

  assert_eq!(shop.store.cancel(order_id).await.unwrap(), CancelOutcome::AlreadyCancelled);
  assert_eq!(shop.stock_of(mug).await, 5);
  let order = shop.store.find(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
#[serial]
async fn test_payment_after_cancellation_is_reported_not_applied() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 5).await;
  let order_id = pending_order(&shop, mug, 1).await;
  shop.store.cancel(order_id).await.unwrap();

  assert_eq!(
    shop.store.mark_paid(order_id).await.unwrap(),
    PaymentTransition::ArrivedAfterCancellation
  );
  let order = shop.store.find(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Cancelled);
  assert_eq!(shop.stock_of(mug).await, 5);
}

#[tokio::test]
#[serial]
async fn test_unknown_orders() {
  let shop = TestShop::new();
  assert!(shop.store.find(77).await.unwrap().is_none());
  assert!(matches!(shop.store.mark_paid(77).await, Err(AppError::OrderNotFound(77))));
  assert_eq!(shop.store.cancel(77).await.unwrap(), CancelOutcome::NotFound);
}

#[tokio::test]
#[serial]
async fn test_stale_pending_ignores_settled_and_recent_orders() {
  let shop = TestShop::new();
  let mug = shop.add_product("Mug", "9.99", 10).await;
  let paid = pending_order(&shop, mug, 1).await;
  let cancelled = pending_order(&shop, mug, 1).await;
  let waiting = pending_order(&shop, mug, 1).await;
  shop.store.mark_paid(paid).await.unwrap();
  shop.store.cancel(cancelled).await.unwrap();

  let future_cutoff = Utc::now() + ChronoDuration::seconds(5);
  assert_eq!(shop.store.stale_pending(future_cutoff).await.unwrap(), vec![waiting]);

  let past_cutoff = Utc::now() - ChronoDuration::seconds(60);
  assert!(shop.store.stale_pending(past_cutoff).await.unwrap().is_empty());
}
