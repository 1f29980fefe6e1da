// storefront/src/lib.rs

//! Storefront backend: catalog, cart availability, stock reservation and hosted
//! payment checkout, built on `shopflow` pipelines.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod sweeper;
pub mod web;

pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use state::AppState;
