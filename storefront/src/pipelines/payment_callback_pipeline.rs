// storefront/src/pipelines/payment_callback_pipeline.rs

//! Reconciles the payment provider's redirect with the order it was opened for.

use crate::errors::AppError;
use crate::models::{CancelOutcome, PaymentTransition};
use crate::pipelines::contexts::{PaymentCancelledCtxData, PaymentConfirmedCtxData, ReservationState};
use shopflow::{ContextData, FlowRegistry, Pipeline, PipelineControl};
use tracing::{error, info, warn};

pub fn register_payment_confirmed_pipeline(flows: &FlowRegistry<AppError>) {
  let mut p = Pipeline::<PaymentConfirmedCtxData, AppError>::new(&[("load_order", false, None), ("mark_paid", false, None)]);

  p.on("load_order", |ctx_data: ContextData<PaymentConfirmedCtxData>| {
    Box::pin(async move {
      let (orders, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.order_id)
      };
      let order = orders.find(order_id).await?;
      if order.is_none() {
        warn!(order_id, "Payment confirmation for an unknown order.");
        return Ok(PipelineControl::Stop);
      }
      ctx_data.write().order = order;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on("mark_paid", |ctx_data: ContextData<PaymentConfirmedCtxData>| {
    Box::pin(async move {
      let (orders, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.order_id)
      };
      let transition = orders.mark_paid(order_id).await?;
      match transition {
        PaymentTransition::Paid => info!(order_id, "Order paid."),
        PaymentTransition::AlreadyPaid => info!(order_id, "Duplicate payment confirmation ignored."),
        PaymentTransition::ArrivedAfterCancellation => error!(
          order_id,
          "Payment confirmed for a cancelled order; its stock was already released. Reconcile manually."
        ),
      }
      let mut guard = ctx_data.write();
      guard.transition = Some(transition);
      guard.state = match transition {
        PaymentTransition::ArrivedAfterCancellation => ReservationState::Cancelled,
        PaymentTransition::Paid | PaymentTransition::AlreadyPaid => ReservationState::Paid,
      };
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  flows.register_pipeline(p);
  info!("Payment confirmed pipeline registered.");
}

pub fn register_payment_cancelled_pipeline(flows: &FlowRegistry<AppError>) {
  let mut p =
    Pipeline::<PaymentCancelledCtxData, AppError>::new(&[("load_order", false, None), ("cancel_and_release", false, None)]);

  p.on("load_order", |ctx_data: ContextData<PaymentCancelledCtxData>| {
    Box::pin(async move {
      let (orders, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.order_id)
      };
      let order = orders.find(order_id).await?;
      if order.is_none() {
        warn!(order_id, "Payment cancellation for an unknown order.");
        return Ok(PipelineControl::Stop);
      }
      ctx_data.write().order = order;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on("cancel_and_release", |ctx_data: ContextData<PaymentCancelledCtxData>| {
    Box::pin(async move {
      let (orders, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.order_id)
      };
      let outcome = orders.cancel(order_id).await?;
      match outcome {
        CancelOutcome::Cancelled => info!(order_id, "Order cancelled and stock released."),
        CancelOutcome::AlreadyPaid => warn!(order_id, "Cancellation for a paid order ignored."),
        CancelOutcome::AlreadyCancelled | CancelOutcome::NotFound => {
          info!(order_id, ?outcome, "Cancellation had nothing to do.")
        }
      }
      let mut guard = ctx_data.write();
      guard.outcome = Some(outcome);
      if matches!(outcome, CancelOutcome::Cancelled | CancelOutcome::AlreadyCancelled) {
        guard.state = ReservationState::Cancelled;
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  flows.register_pipeline(p);
  info!("Payment cancelled pipeline registered.");
}
