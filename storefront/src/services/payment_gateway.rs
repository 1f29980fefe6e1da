// storefront/src/services/payment_gateway.rs

//! Hosted checkout sessions. `StripeGateway` talks to the Stripe Checkout API;
//! `MockPaymentGateway` answers locally and sends the shopper straight to the
//! success URL.

use crate::config::{AppConfig, PaymentProvider};
use crate::errors::{AppError, Result};
use crate::models::money;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayLineItem {
  pub name: String,
  /// Per-unit price in minor units, computed by the server.
  pub unit_amount: i64,
  pub quantity: i32,
}

/// A one-off payment for a pending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
  pub order_id: i64,
  pub currency: String,
  pub line_items: Vec<GatewayLineItem>,
  pub success_url: String,
  pub cancel_url: String,
}

impl CheckoutRequest {
  /// `Validation` error if the total does not fit in an `i64`.
  pub fn total_minor_units(&self) -> Result<i64> {
    money::total_minor_units(self.line_items.iter().map(|line| (line.unit_amount, line.quantity)))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
  pub id: String,
  /// Where to send the shopper, when the provider hosts the page.
  pub url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<PaymentSession>;

  /// Key the browser needs to talk to the provider directly.
  fn public_key(&self) -> &str;
}

pub struct StripeGateway {
  client: reqwest::Client,
  api_base: String,
  secret_key: String,
  public_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
  id: String,
  url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
  error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
  message: Option<String>,
}

impl StripeGateway {
  pub fn new(api_base: &str, secret_key: &str, public_key: &str) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .map_err(|e| AppError::Config(format!("Cannot build payment HTTP client: {}", e)))?;
    Ok(Self {
      client,
      api_base: api_base.trim_end_matches('/').to_string(),
      secret_key: secret_key.to_string(),
      public_key: public_key.to_string(),
    })
  }

  fn form_fields(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut fields = vec![
      ("mode".to_string(), "payment".to_string()),
      ("payment_method_types[0]".to_string(), "card".to_string()),
      ("success_url".to_string(), request.success_url.clone()),
      ("cancel_url".to_string(), request.cancel_url.clone()),
      ("client_reference_id".to_string(), request.order_id.to_string()),
    ];
    for (i, line) in request.line_items.iter().enumerate() {
      let prefix = format!("line_items[{}]", i);
      fields.push((format!("{}[quantity]", prefix), line.quantity.to_string()));
      fields.push((format!("{}[price_data][currency]", prefix), request.currency.clone()));
      fields.push((format!("{}[price_data][unit_amount]", prefix), line.unit_amount.to_string()));
      fields.push((format!("{}[price_data][product_data][name]", prefix), line.name.clone()));
    }
    fields
  }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
  #[instrument(
    name = "StripeGateway::create_checkout_session",
    skip_all,
    fields(order_id = request.order_id, lines = request.line_items.len()),
    err(Display)
  )]
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<PaymentSession> {
    let response = self
      .client
      .post(format!("{}/v1/checkout/sessions", self.api_base))
      .bearer_auth(&self.secret_key)
      .form(&Self::form_fields(request))
      .send()
      .await
      .map_err(|e| AppError::PaymentGateway(format!("Request to payment provider failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
      let message = match response.json::<StripeErrorEnvelope>().await {
        Ok(envelope) => envelope.error.message.unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
      };
      warn!(%status, %message, "Payment provider rejected checkout session.");
      return Err(AppError::PaymentGateway(message));
    }

    let session: StripeSession = response
      .json()
      .await
      .map_err(|e| AppError::PaymentGateway(format!("Unreadable checkout session: {}", e)))?;
    info!(session_id = %session.id, "Checkout session created.");
    Ok(PaymentSession {
      id: session.id,
      url: session.url,
    })
  }

  fn public_key(&self) -> &str {
    &self.public_key
  }
}

/// In-process gateway. Records every request and can be switched to fail.
#[derive(Default)]
pub struct MockPaymentGateway {
  failing: AtomicBool,
  requests: Mutex<Vec<CheckoutRequest>>,
}

impl MockPaymentGateway {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn requests(&self) -> Vec<CheckoutRequest> {
    self.requests.lock().clone()
  }

  pub fn last_request(&self) -> Option<CheckoutRequest> {
    self.requests.lock().last().cloned()
  }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
  #[instrument(name = "MockPaymentGateway::create_checkout_session", skip_all, fields(order_id = request.order_id), err(Display))]
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<PaymentSession> {
    self.requests.lock().push(request.clone());
    if self.failing.load(Ordering::SeqCst) {
      return Err(AppError::PaymentGateway("Mock gateway configured to fail".to_string()));
    }
    let id = format!("mock_cs_{}", Uuid::new_v4().simple());
    info!(session_id = %id, total = ?request.total_minor_units().ok(), "Simulated checkout session.");
    Ok(PaymentSession {
      id,
      url: Some(request.success_url.clone()),
    })
  }

  fn public_key(&self) -> &str {
    "pk_mock"
  }
}

/// The gateway selected by `PAYMENT_PROVIDER`.
pub fn build_gateway(config: &AppConfig) -> Result<Arc<dyn PaymentGateway>> {
  match config.payment_provider {
    PaymentProvider::Stripe => {
      let secret_key = config
        .payment_secret_key
        .as_deref()
        .ok_or_else(|| AppError::Config("PAYMENT_SECRET_KEY is required for Stripe".to_string()))?;
      Ok(Arc::new(StripeGateway::new(
        &config.payment_api_base,
        secret_key,
        &config.payment_public_key,
      )?))
    }
    PaymentProvider::Mock => {
      warn!("Using the mock payment gateway; no money will move.");
      Ok(Arc::new(MockPaymentGateway::new()))
    }
  }
}
