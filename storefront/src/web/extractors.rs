// storefront/src/web/extractors.rs

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::Utc;
use futures_util::future::{ready, Ready};
use std::collections::HashMap;
use tracing::warn;

use crate::errors::{AppError, Result};
use crate::services::url_signer::{EXPIRY_PARAM, SIGNATURE_PARAM};
use crate::state::AppState;

/// Proof that the request URL carries a valid, unexpired signature for its path.
///
/// Add it as a handler argument ahead of the other extractors so unsigned
/// requests are refused before anything else is parsed.
#[derive(Debug)]
pub struct SignedRequest;

impl FromRequest for SignedRequest {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(verify_signature(req).map(|_| SignedRequest))
  }
}

fn verify_signature(req: &HttpRequest) -> Result<()> {
  let app_state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("Application state is not configured".to_string()))?;
  let params = web::Query::<HashMap<String, String>>::from_query(req.query_string())
    .map_err(|_| AppError::Auth("Malformed query string".to_string()))?;

  let verdict = app_state.signer.verify(
    req.path(),
    params.get(EXPIRY_PARAM).map(String::as_str),
    params.get(SIGNATURE_PARAM).map(String::as_str),
    Utc::now().timestamp(),
  );
  if let Err(e) = &verdict {
    warn!(path = %req.path(), error = %e, "Rejected request with bad URL signature.");
  }
  verdict
}

/// Like `SignedRequest`, but the whole query string must be the one that was
/// signed (`UrlSigner::sign_action`). Used for links that name their target in
/// the query, such as `/delete_product?id=`.
#[derive(Debug)]
pub struct SignedAction;

impl FromRequest for SignedAction {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(verify_action_signature(req).map(|_| SignedAction))
  }
}

fn verify_action_signature(req: &HttpRequest) -> Result<()> {
  let app_state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("Application state is not configured".to_string()))?;
  let query = web::Query::<Vec<(String, String)>>::from_query(req.query_string())
    .map_err(|_| AppError::Auth("Malformed query string".to_string()))?;

  let verdict = app_state
    .signer
    .verify_action(req.path(), &query, Utc::now().timestamp());
  if let Err(e) = &verdict {
    warn!(path = %req.path(), error = %e, "Rejected action with bad URL signature.");
  }
  verdict
}

/// Parses a numeric id taken from a path segment or query parameter.
pub fn parse_id(raw: &str, what: &str) -> Result<i64> {
  raw
    .trim()
    .parse::<i64>()
    .map_err(|_| AppError::Validation(format!("Invalid {} '{}'", what, raw)))
}
