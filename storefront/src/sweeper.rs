// storefront/src/sweeper.rs

//! Cancels pending orders whose shoppers never came back from the payment page,
//! returning their stock to the catalog.

use crate::errors::Result;
use crate::models::CancelOutcome;
use crate::store::OrderStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Cancels every pending order created before `cutoff`. Returns how many were cancelled.
///
/// Goes through `OrderStore::cancel`, so an order a shopper cancels concurrently is
/// re-credited only once.
#[instrument(name = "sweep_abandoned_orders", skip(orders), err(Display))]
pub async fn sweep_abandoned_orders(orders: &dyn OrderStore, cutoff: DateTime<Utc>) -> Result<usize> {
  let stale = orders.stale_pending(cutoff).await?;
  let mut cancelled = 0;
  for order_id in stale {
    match orders.cancel(order_id).await {
      Ok(CancelOutcome::Cancelled) => cancelled += 1,
      Ok(other) => info!(order_id, ?other, "Order settled before the sweep reached it."),
      Err(e) => warn!(order_id, error = %e, "Failed to cancel abandoned order."),
    }
  }
  if cancelled > 0 {
    info!(cancelled, "Abandoned orders cancelled.");
  }
  Ok(cancelled)
}

/// Runs the sweep every `interval` on the current runtime.
pub fn spawn_order_sweeper(orders: Arc<dyn OrderStore>, interval: Duration, pending_ttl: Duration) {
  actix_rt::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(?interval, ?pending_ttl, "Abandoned-order sweeper started.");
    loop {
      ticker.tick().await;
      let cutoff = match chrono::Duration::from_std(pending_ttl) {
        Ok(ttl) => Utc::now() - ttl,
        Err(e) => {
          error!(error = %e, "Pending order TTL out of range; sweeper stopping.");
          return;
        }
      };
      // Errors are already logged by the span; the next tick retries.
      let _ = sweep_abandoned_orders(orders.as_ref(), cutoff).await;
    }
  });
}
