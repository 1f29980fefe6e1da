// storefront/src/pipelines/pay_pipeline.rs

//! Reserve stock, record a pending order and open a payment session.
//!
//! Each side-effecting step registers its undo action, so a failure further down
//! (typically the payment provider) cancels the order and puts the stock back.

use crate::errors::AppError;
use crate::models::money::to_minor_units;
use crate::models::{validate_cart, CancelOutcome};
use crate::pipelines::contexts::{PayCtxData, ReservationState};
use crate::services::{CheckoutRequest, GatewayLineItem};
use shopflow::{ContextData, FlowRegistry, Pipeline, PipelineControl};
use tracing::{error, info, warn};

pub fn register_pay_pipeline(flows: &FlowRegistry<AppError>) {
  let mut p = Pipeline::<PayCtxData, AppError>::new(&[
    ("validate_cart", false, None),
    ("reserve_inventory", false, None),
    ("create_pending_order", false, None),
    ("build_payment_request", false, None),
    ("open_payment_session", false, None),
    ("record_payment_session", true, None),
  ]);

  p.on("validate_cart", |ctx_data: ContextData<PayCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let requests = validate_cart(&guard.cart)?;
      if requests.is_empty() {
        return Err(AppError::Validation("Cannot pay for an empty cart".to_string()));
      }
      guard.requests = requests;
      Ok(PipelineControl::Continue)
    })
  });

  p.on("reserve_inventory", reserve_inventory);
  p.compensate("reserve_inventory", release_inventory);

  p.on("create_pending_order", create_pending_order);
  p.compensate("create_pending_order", cancel_pending_order);

  p.on("build_payment_request", |ctx_data: ContextData<PayCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let order_id = guard
        .order_id
        .ok_or_else(|| AppError::Internal("Payment request built before the order".to_string()))?;

      let line_items = guard
        .line_items
        .iter()
        .map(|line| -> Result<GatewayLineItem, AppError> {
          Ok(GatewayLineItem {
            name: line.product_name.clone(),
            unit_amount: to_minor_units(line.unit_price)?,
            quantity: line.quantity,
          })
        })
        .collect::<Result<Vec<_>, _>>()?;

      let config = guard.app_state.config.clone();
      let signer = guard.app_state.signer.clone();
      let success_path = format!("/successful_payment/{}", order_id);
      let cancel_path = format!("/cancelled_payment/{}", order_id);
      let request = CheckoutRequest {
        order_id,
        currency: config.payment_currency.clone(),
        line_items,
        success_url: format!("{}{}", config.app_base_url, signer.sign(&success_path, config.callback_url_ttl)),
        cancel_url: format!("{}{}", config.app_base_url, signer.sign(&cancel_path, config.callback_url_ttl)),
      };
      // Checked before the provider sees it; an overflow fails the step and compensates.
      let total = request.total_minor_units()?;
      info!(order_id, total, currency = %request.currency, "Payment request built.");
      guard.checkout_request = Some(request);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on("open_payment_session", |ctx_data: ContextData<PayCtxData>| {
    Box::pin(async move {
      let (gateway, request) = {
        let guard = ctx_data.read();
        (guard.app_state.gateway.clone(), guard.checkout_request.clone())
      };
      let request =
        request.ok_or_else(|| AppError::Internal("Payment session opened without a request".to_string()))?;
      let session = gateway.create_checkout_session(&request).await?;
      info!(order_id = request.order_id, session_id = %session.id, "Payment session opened.");
      {
        let mut guard = ctx_data.write();
        guard.session = Some(session);
        guard.state = ReservationState::PaymentSessionCreated;
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Best effort: the session id only helps reconciliation.
  p.on("record_payment_session", |ctx_data: ContextData<PayCtxData>| {
    Box::pin(async move {
      let (orders, order_id, session_id) = {
        let guard = ctx_data.read();
        (
          guard.app_state.orders.clone(),
          guard.order_id,
          guard.session.as_ref().map(|s| s.id.clone()),
        )
      };
      if let (Some(order_id), Some(session_id)) = (order_id, session_id) {
        orders.attach_payment_session(order_id, &session_id).await?;
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  flows.register_pipeline(p);
  info!("Pay pipeline registered.");
}

async fn reserve_inventory(ctx_data: ContextData<PayCtxData>) -> Result<PipelineControl, AppError> {
  let (ledger, requests) = {
    let guard = ctx_data.read();
    (guard.app_state.ledger.clone(), guard.requests.clone())
  };

  match ledger.reserve(&requests).await {
    Ok(line_items) => {
      info!(lines = line_items.len(), "Inventory reserved.");
      let mut guard = ctx_data.write();
      guard.line_items = line_items;
      guard.state = ReservationState::Reserved;
      Ok(PipelineControl::Continue)
    }
    Err(AppError::InsufficientStock { product_ids }) => {
      // Nothing was decremented, so stopping needs no compensation.
      info!(?product_ids, "Not enough stock, payment not started.");
      ctx_data.write().short_products = Some(product_ids);
      Ok(PipelineControl::Stop)
    }
    Err(e) => Err(e),
  }
}

async fn release_inventory(ctx_data: ContextData<PayCtxData>) -> Result<(), AppError> {
  let (ledger, line_items, already_released) = {
    let guard = ctx_data.read();
    (guard.app_state.ledger.clone(), guard.line_items.clone(), guard.stock_released)
  };
  if already_released {
    return Ok(());
  }
  ledger.release(&line_items).await?;
  warn!(lines = line_items.len(), "Reservation released.");
  let mut guard = ctx_data.write();
  guard.stock_released = true;
  guard.state = ReservationState::Cancelled;
  Ok(())
}

async fn create_pending_order(ctx_data: ContextData<PayCtxData>) -> Result<PipelineControl, AppError> {
  let (orders, line_items, fulfillment) = {
    let guard = ctx_data.read();
    (guard.app_state.orders.clone(), guard.line_items.clone(), guard.fulfillment.clone())
  };
  let order_id = orders.create_pending(&line_items, fulfillment).await?;
  info!(order_id, "Pending order created.");
  let mut guard = ctx_data.write();
  guard.order_id = Some(order_id);
  guard.state = ReservationState::OrderCreated;
  Ok(PipelineControl::Continue)
}

// Once the order exists, its stock follows the order: cancelling re-credits it, and
// whoever cancelled first already did. The reservation's own undo must then stay a no-op.
async fn cancel_pending_order(ctx_data: ContextData<PayCtxData>) -> Result<(), AppError> {
  let (orders, order_id) = {
    let guard = ctx_data.read();
    (guard.app_state.orders.clone(), guard.order_id)
  };
  let Some(order_id) = order_id else {
    return Ok(());
  };

  let outcome = match orders.cancel(order_id).await {
    Ok(outcome) => outcome,
    Err(e) => {
      // Still pending with its stock held; the sweeper cancels and re-credits it later.
      ctx_data.write().stock_released = true;
      error!(order_id, error = %e, "Pending order could not be cancelled; leaving it to the sweeper.");
      return Err(e);
    }
  };

  let mut guard = ctx_data.write();
  match outcome {
    CancelOutcome::Cancelled => {
      warn!(order_id, "Pending order cancelled after a later step failed.");
      guard.stock_released = true;
      guard.state = ReservationState::Cancelled;
    }
    CancelOutcome::AlreadyCancelled => {
      warn!(order_id, "Pending order was already cancelled; its stock is back.");
      guard.stock_released = true;
      guard.state = ReservationState::Cancelled;
    }
    CancelOutcome::AlreadyPaid => {
      error!(order_id, "Order was paid while its payment session failed. Reconcile manually.");
      guard.stock_released = true;
    }
    // The row is gone, so nothing else will ever re-credit the reservation.
    CancelOutcome::NotFound => error!(order_id, "Pending order vanished before it could be cancelled."),
  }
  Ok(())
}
