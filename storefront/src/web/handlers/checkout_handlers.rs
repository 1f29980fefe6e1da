// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::CartItem;
use crate::pipelines::contexts::{CheckAvailabilityCtxData, PayCtxData};
use crate::state::AppState;
use crate::web::extractors::SignedRequest;
use shopflow::{ContextData, PipelineResult};

#[derive(Deserialize, Debug)]
pub struct CheckoutRequestPayload {
  #[serde(default)]
  pub items: Vec<CartItem>,
}

#[derive(Deserialize, Debug)]
pub struct PayRequestPayload {
  #[serde(default)]
  pub items: Vec<CartItem>,
  #[serde(default)]
  pub fulfillment: Option<Value>,
}

/// Advisory: would this cart be reservable right now?
#[instrument(name = "handler::checkout", skip_all, fields(lines = payload.items.len()))]
pub async fn checkout_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  payload: web::Json<CheckoutRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(CheckAvailabilityCtxData::new(
    app_state.get_ref().clone(),
    payload.into_inner().items,
  ));
  app_state.flows.run(ctx.clone()).await?;

  let available = ctx.read().available;
  info!(available, "Checkout availability answered.");
  Ok(HttpResponse::Ok().json(json!({ "ok": available })))
}

/// Reserves the cart and opens a payment session for it.
#[instrument(name = "handler::pay", skip_all, fields(lines = payload.items.len()))]
pub async fn pay_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  payload: web::Json<PayRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let PayRequestPayload { items, fulfillment } = payload.into_inner();
  let ctx = ContextData::new(PayCtxData::new(app_state.get_ref().clone(), items, fulfillment));

  match app_state.flows.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let guard = ctx.read();
      let session = guard
        .session
        .as_ref()
        .ok_or_else(|| AppError::Internal("Payment flow finished without a session".to_string()))?;
      info!(order_id = ?guard.order_id, session_id = %session.id, "Payment started.");
      Ok(HttpResponse::Ok().json(json!({
          "ok": true,
          "order_id": guard.order_id,
          "session_id": session.id,
          "session_url": session.url,
      })))
    }
    Ok(PipelineResult::Stopped) => {
      let guard = ctx.read();
      match &guard.short_products {
        Some(product_ids) => Ok(HttpResponse::Ok().json(json!({ "ok": false, "insufficient": product_ids }))),
        None => Err(AppError::PipelineHaltedByHandler),
      }
    }
    Err(AppError::InsufficientStock { product_ids }) => {
      Ok(HttpResponse::Ok().json(json!({ "ok": false, "insufficient": product_ids })))
    }
    Err(app_err) => {
      warn!(error = %app_err, state = ?ctx.read().state, "Payment flow failed.");
      Err(app_err)
    }
  }
}
