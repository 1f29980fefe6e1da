// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
  Stripe,
  Mock,
}

impl FromStr for PaymentProvider {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "stripe" => Ok(PaymentProvider::Stripe),
      "mock" => Ok(PaymentProvider::Mock),
      other => Err(AppError::Config(format!(
        "Invalid PAYMENT_PROVIDER '{}': expected 'stripe' or 'mock'",
        other
      ))),
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// `None` runs the storefront on the in-memory store.
  pub database_url: Option<String>,
  pub app_base_url: String,
  pub run_migrations: bool,
  pub seed_db: bool,

  pub url_signing_secret: String,
  pub signed_url_ttl: Duration,
  pub callback_url_ttl: Duration,

  pub payment_provider: PaymentProvider,
  pub payment_secret_key: Option<String>,
  pub payment_public_key: String,
  pub payment_api_base: String,
  pub payment_currency: String,

  pub pending_order_ttl: Duration,
  /// `None` disables the abandoned-order sweeper.
  pub order_sweep_interval: Option<Duration>,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
      .field("app_base_url", &self.app_base_url)
      .field("run_migrations", &self.run_migrations)
      .field("seed_db", &self.seed_db)
      .field("signed_url_ttl", &self.signed_url_ttl)
      .field("callback_url_ttl", &self.callback_url_ttl)
      .field("payment_provider", &self.payment_provider)
      .field("payment_api_base", &self.payment_api_base)
      .field("payment_currency", &self.payment_currency)
      .field("pending_order_ttl", &self.pending_order_ttl)
      .field("order_sweep_interval", &self.order_sweep_interval)
      .finish_non_exhaustive()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    let config = Self::from_lookup(|var_name| env::var(var_name).ok())?;
    tracing::info!(config = ?config, "Application configuration loaded successfully.");
    Ok(config)
  }

  /// Builds the configuration from any variable source; `from_env` passes the process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| lookup(var_name).filter(|v| !v.trim().is_empty());
    let require = |var_name: &str| {
      get_env(var_name).ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let parse_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|| default.to_string());

    let server_host = parse_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_or("SERVER_PORT", "8080")
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL");
    let app_base_url = get_env("APP_BASE_URL")
      .unwrap_or_else(|| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();
    let run_migrations = parse_bool("RUN_MIGRATIONS", &parse_or("RUN_MIGRATIONS", "true"))?;
    let seed_db = parse_bool("SEED_DB", &parse_or("SEED_DB", "false"))?;

    let url_signing_secret = require("URL_SIGNING_SECRET")?;
    let signed_url_ttl = parse_secs("SIGNED_URL_TTL_SECS", &parse_or("SIGNED_URL_TTL_SECS", "3600"))?;
    let callback_url_ttl = parse_secs("CALLBACK_URL_TTL_SECS", &parse_or("CALLBACK_URL_TTL_SECS", "86400"))?;
    if signed_url_ttl.is_zero() || callback_url_ttl.is_zero() {
      return Err(AppError::Config("Signed URL lifetimes must be positive".to_string()));
    }

    let payment_provider: PaymentProvider = parse_or("PAYMENT_PROVIDER", "mock").parse()?;
    let payment_secret_key = get_env("PAYMENT_SECRET_KEY");
    if payment_provider == PaymentProvider::Stripe && payment_secret_key.is_none() {
      return Err(AppError::Config(
        "PAYMENT_SECRET_KEY is required when PAYMENT_PROVIDER=stripe".to_string(),
      ));
    }
    let payment_public_key = parse_or("PAYMENT_PUBLIC_KEY", "");
    let payment_api_base = parse_or("PAYMENT_API_BASE", "https://api.stripe.com")
      .trim_end_matches('/')
      .to_string();
    let payment_currency = parse_or("PAYMENT_CURRENCY", "usd").to_ascii_lowercase();

    let pending_order_ttl = parse_secs("PENDING_ORDER_TTL_SECS", &parse_or("PENDING_ORDER_TTL_SECS", "1800"))?;
    let sweep_interval = parse_secs("ORDER_SWEEP_INTERVAL_SECS", &parse_or("ORDER_SWEEP_INTERVAL_SECS", "60"))?;
    let order_sweep_interval = (!sweep_interval.is_zero()).then_some(sweep_interval);

    Ok(Self {
      server_host,
      server_port,
      database_url,
      app_base_url,
      run_migrations,
      seed_db,
      url_signing_secret,
      signed_url_ttl,
      callback_url_ttl,
      payment_provider,
      payment_secret_key,
      payment_public_key,
      payment_api_base,
      payment_currency,
      pending_order_ttl,
      order_sweep_interval,
    })
  }
}

fn parse_bool(var_name: &str, raw: &str) -> Result<bool> {
  raw
    .trim()
    .to_ascii_lowercase()
    .parse::<bool>()
    .map_err(|e| AppError::Config(format!("Invalid {} value: {}", var_name, e)))
}

fn parse_secs(var_name: &str, raw: &str) -> Result<Duration> {
  raw
    .trim()
    .parse::<u64>()
    .map(Duration::from_secs)
    .map_err(|e| AppError::Config(format!("Invalid {} value: {}", var_name, e)))
}
