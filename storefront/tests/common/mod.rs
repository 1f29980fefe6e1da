// tests/common/mod.rs
#![allow(dead_code)]

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use shopflow::{ContextData, PipelineResult};
use std::str::FromStr;
use std::sync::Arc;
use storefront::models::{CartItem, ProductDraft};
use storefront::pipelines::PayCtxData;
use storefront::services::MockPaymentGateway;
use storefront::store::{Catalog, MemoryStore};
use storefront::{AppConfig, AppError, AppState};
use tracing::Level;

pub const BASE_URL: &str = "http://shop.test";
pub const SECRET: &str = "test-signing-secret";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn test_config() -> AppConfig {
  AppConfig::from_lookup(|key| match key {
    "URL_SIGNING_SECRET" => Some(SECRET.to_string()),
    "APP_BASE_URL" => Some(BASE_URL.to_string()),
    "PAYMENT_PROVIDER" => Some("mock".to_string()),
    _ => None,
  })
  .expect("test config")
}

/// A storefront wired to the in-memory store and the mock gateway.
pub struct TestShop {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<MockPaymentGateway>,
}

impl TestShop {
  pub fn new() -> Self {
    setup_tracing();
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let state = AppState::new(store.clone(), gateway.clone(), Arc::new(test_config())).expect("app state");
    Self { state, store, gateway }
  }

  pub async fn add_product(&self, name: &str, price: &str, quantity: i32) -> i64 {
    self
      .store
      .add(ProductDraft {
        name: name.to_string(),
        price: Decimal::from_str(price).unwrap(),
        quantity,
        description: Some(format!("{} description", name)),
        image: None,
      })
      .await
      .unwrap()
      .id
  }

  pub async fn stock_of(&self, product_id: i64) -> i32 {
    self.store.get(product_id).await.unwrap().expect("product exists").quantity
  }

  pub async fn pay(&self, items: Vec<CartItem>) -> (Result<PipelineResult, AppError>, ContextData<PayCtxData>) {
    let ctx = ContextData::new(PayCtxData::new(
      self.state.clone(),
      items,
      Some(serde_json::json!({"name": "Ada", "address": "1 Test Lane"})),
    ));
    let result = self.state.flows.run(ctx.clone()).await;
    (result, ctx)
  }
}

pub fn item(product_id: i64, quantity: i64) -> CartItem {
  CartItem { product_id, quantity }
}

pub fn dec(s: &str) -> Decimal {
  Decimal::from_str(s).unwrap()
}

/// Path and query of an absolute URL produced by the storefront.
pub fn local_part(url: &str) -> &str {
  url.strip_prefix(BASE_URL).unwrap_or(url)
}
