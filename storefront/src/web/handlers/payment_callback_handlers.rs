// storefront/src/web/handlers/payment_callback_handlers.rs

//! Where the payment provider sends the shopper back. Both end on the storefront
//! home page, whatever the order turned out to be.

use actix_web::{http::header, web, HttpResponse};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::pipelines::contexts::{PaymentCancelledCtxData, PaymentConfirmedCtxData};
use crate::state::AppState;
use crate::web::extractors::{parse_id, SignedRequest};
use shopflow::ContextData;

fn redirect_to(location: &str) -> HttpResponse {
  HttpResponse::SeeOther()
    .insert_header((header::LOCATION, location.to_string()))
    .finish()
}

#[instrument(name = "handler::successful_payment", skip(app_state, _signed))]
pub async fn successful_payment_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order_id = parse_id(&path, "order id")?;
  let ctx = ContextData::new(PaymentConfirmedCtxData::new(app_state.get_ref().clone(), order_id));
  app_state.flows.run(ctx.clone()).await?;

  let transition = ctx.read().transition;
  info!(order_id, ?transition, "Payment confirmation handled.");
  Ok(redirect_to("/index?clear_cart=y"))
}

#[instrument(name = "handler::cancelled_payment", skip(app_state, _signed))]
pub async fn cancelled_payment_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order_id = parse_id(&path, "order id")?;
  let ctx = ContextData::new(PaymentCancelledCtxData::new(app_state.get_ref().clone(), order_id));
  app_state.flows.run(ctx.clone()).await?;

  let outcome = ctx.read().outcome;
  info!(order_id, ?outcome, "Payment cancellation handled.");
  Ok(redirect_to("/index"))
}
