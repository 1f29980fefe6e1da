// storefront/src/pipelines/checkout_pipeline.rs

use crate::errors::AppError;
use crate::models::validate_cart;
use crate::pipelines::contexts::{CheckAvailabilityCtxData, ReservationState};
use shopflow::{ContextData, FlowRegistry, Pipeline, PipelineControl, SkipCondition};
use std::sync::Arc;
use tracing::{debug, info};

pub fn register_checkout_pipeline(flows: &FlowRegistry<AppError>) {
  let empty_cart: SkipCondition<CheckAvailabilityCtxData> = Arc::new(|ctx| ctx.read().requests.is_empty());

  let mut p = Pipeline::<CheckAvailabilityCtxData, AppError>::new(&[
    ("validate_cart", false, None),
    ("check_stock", false, Some(empty_cart)),
  ]);

  p.on("validate_cart", |ctx_data: ContextData<CheckAvailabilityCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let requests = validate_cart(&guard.cart)?;
      guard.requests = requests;
      // Nothing to check for an empty cart; check_stock is skipped.
      guard.available = guard.requests.is_empty();
      debug!(lines = guard.requests.len(), "Cart validated for availability check.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on("check_stock", |ctx_data: ContextData<CheckAvailabilityCtxData>| {
    Box::pin(async move {
      let (ledger, requests) = {
        let guard = ctx_data.read();
        (guard.app_state.ledger.clone(), guard.requests.clone())
      };
      let available = ledger.check_availability(&requests).await?;
      {
        let mut guard = ctx_data.write();
        guard.available = available;
        guard.state = ReservationState::StockChecked;
      }
      info!(available, lines = requests.len(), "Stock checked.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  flows.register_pipeline(p);
  info!("Checkout pipeline registered.");
}
