// storefront/src/pipelines/mod.rs

//! The reservation protocol as shopflow pipelines, one per context type.

use crate::errors::AppError;
use shopflow::FlowRegistry;

pub mod contexts;

pub mod checkout_pipeline;
pub mod pay_pipeline;
pub mod payment_callback_pipeline;

pub use contexts::{CheckAvailabilityCtxData, PayCtxData, PaymentCancelledCtxData, PaymentConfirmedCtxData, ReservationState};

/// Registers every storefront pipeline. Called once while building `AppState`.
pub fn register_all_pipelines(flows: &FlowRegistry<AppError>) {
  tracing::info!("Registering storefront pipelines...");

  checkout_pipeline::register_checkout_pipeline(flows);
  pay_pipeline::register_pay_pipeline(flows);
  payment_callback_pipeline::register_payment_confirmed_pipeline(flows);
  payment_callback_pipeline::register_payment_cancelled_pipeline(flows);

  tracing::info!("All storefront pipelines registered.");
}
