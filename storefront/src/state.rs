// storefront/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::pipelines::register_all_pipelines;
use crate::services::{PaymentGateway, UrlSigner};
use crate::store::{Catalog, InventoryLedger, OrderStore};
use shopflow::FlowRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub ledger: Arc<dyn InventoryLedger>,
  pub orders: Arc<dyn OrderStore>,
  pub catalog: Arc<dyn Catalog>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
  pub signer: Arc<UrlSigner>,
}

impl AppState {
  /// Wires one storage engine into every store seam and registers the pipelines.
  pub fn new<S>(store: Arc<S>, gateway: Arc<dyn PaymentGateway>, config: Arc<AppConfig>) -> Result<Self>
  where
    S: InventoryLedger + OrderStore + Catalog + 'static,
  {
    let signer = Arc::new(UrlSigner::new(&config.url_signing_secret)?);
    let flows = Arc::new(FlowRegistry::<AppError>::new());
    register_all_pipelines(&flows);

    Ok(Self {
      ledger: store.clone(),
      orders: store.clone(),
      catalog: store,
      gateway,
      flows,
      config,
      signer,
    })
  }
}
