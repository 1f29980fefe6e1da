// storefront/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use storefront::services::build_gateway;
use storefront::store::{seed_demo_catalog, MemoryStore, PgStore};
use storefront::sweeper::spawn_order_sweeper;
use storefront::web::configure_app_routes;
use storefront::{AppConfig, AppError, AppState};

async fn build_state(config: Arc<AppConfig>) -> Result<AppState, AppError> {
  let gateway = build_gateway(&config)?;
  let state = match &config.database_url {
    Some(database_url) => {
      let store = PgStore::connect(database_url).await?;
      if config.run_migrations {
        store.migrate().await?;
      }
      AppState::new(Arc::new(store), gateway, config.clone())?
    }
    None => {
      tracing::warn!("DATABASE_URL not set; using the in-memory store. Data is lost on restart.");
      AppState::new(Arc::new(MemoryStore::new()), gateway, config.clone())?
    }
  };

  if config.seed_db {
    seed_demo_catalog(state.catalog.as_ref()).await?;
  }
  Ok(state)
}

fn to_io_error(e: AppError) -> std::io::Error {
  std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting storefront server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(to_io_error(e));
    }
  };

  let app_state = match build_state(app_config.clone()).await {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise the storefront.");
      return Err(to_io_error(e));
    }
  };

  if let Some(interval) = app_config.order_sweep_interval {
    spawn_order_sweeper(app_state.orders.clone(), interval, app_config.pending_order_ttl);
  }

  tracing::info!(
    url = %format!(
      "{}{}",
      app_config.app_base_url,
      app_state.signer.sign("/manage_products", app_config.signed_url_ttl)
    ),
    "Staff console link (expires with SIGNED_URL_TTL_SECS)."
  );

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
