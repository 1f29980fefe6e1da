// storefront/src/errors.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use shopflow::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Insufficient stock for products {product_ids:?}")]
  InsufficientStock { product_ids: Vec<i64> },

  #[error("Unknown product: {0}")]
  UnknownProduct(i64),

  #[error("Order not found: {0}")]
  OrderNotFound(i64),

  #[error("Payment Gateway Error: {0}")]
  PaymentGateway(String),

  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),

  // A pipeline stopped early where the HTTP handler needed it to complete.
  #[error("Pipeline execution was halted by a handler.")]
  PipelineHaltedByHandler,
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl From<sqlx::migrate::MigrateError> for AppError {
  fn from(err: sqlx::migrate::MigrateError) -> Self {
    AppError::Sqlx(sqlx::Error::Migrate(Box::new(err)))
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::InsufficientStock { .. } | AppError::PipelineHaltedByHandler => StatusCode::CONFLICT,
      AppError::UnknownProduct(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::OrderNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    match self {
      AppError::InsufficientStock { product_ids } => {
        HttpResponse::Conflict().json(json!({"ok": false, "error": "insufficient stock", "product_ids": product_ids}))
      }
      AppError::UnknownProduct(id) => {
        HttpResponse::BadRequest().json(json!({"error": "unknown product", "product_id": id}))
      }
      AppError::OrderNotFound(id) => HttpResponse::NotFound().json(json!({"error": "order not found", "order_id": id})),
      AppError::PaymentGateway(m) => {
        HttpResponse::BadGateway().json(json!({"ok": false, "error": "Payment provider error", "detail": m}))
      }
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::Auth(m) => HttpResponse::Unauthorized().json(json!({"error": m})),
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Configuration issue", "detail": m}))
      }
      AppError::Sqlx(_) => HttpResponse::InternalServerError().json(json!({"error": "Database operation failed"})),
      AppError::Workflow { source } => {
        tracing::error!(flow_error_source = ?source, "Workflow error details");
        HttpResponse::InternalServerError().json(json!({"error": "Workflow processing error"}))
      }
      AppError::Internal(_) => HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred"})),
      AppError::PipelineHaltedByHandler => {
        HttpResponse::Conflict().json(json!({"error": "Process halted as expected by business logic."}))
      }
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
