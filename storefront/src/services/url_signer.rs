// storefront/src/services/url_signer.rs

//! Expiring HMAC-SHA256 signatures for the URLs the storefront hands to the
//! browser and to the payment provider.
//!
//! A signed URL carries `_exp` (unix seconds) and `_sig`, the hex HMAC of
//! `"{path}\n{exp}"`. The query string outside those two parameters is not signed,
//! so browsers may add their own (`/products?q=`).
//!
//! Action URLs (`sign_action`) also bind their query: the HMAC covers
//! `"{path}\n{query}\n{exp}"`, where `query` is every other parameter as
//! `key=value`, sorted and joined with `&`. A link to delete one product
//! cannot be replayed against another id.

use crate::errors::{AppError, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const EXPIRY_PARAM: &str = "_exp";
pub const SIGNATURE_PARAM: &str = "_sig";

pub struct UrlSigner {
  keyed: HmacSha256,
}

impl std::fmt::Debug for UrlSigner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("UrlSigner([REDACTED])")
  }
}

impl UrlSigner {
  pub fn new(secret: &str) -> Result<Self> {
    let keyed = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
      .map_err(|e| AppError::Config(format!("Unusable URL signing secret: {}", e)))?;
    Ok(Self { keyed })
  }

  fn mac(&self, path: &str, expires_at: i64) -> HmacSha256 {
    let mut mac = self.keyed.clone();
    mac.update(format!("{}\n{}", path, expires_at).as_bytes());
    mac
  }

  fn action_mac(&self, path: &str, canonical_query: &str, expires_at: i64) -> HmacSha256 {
    let mut mac = self.keyed.clone();
    mac.update(format!("{}\n{}\n{}", path, canonical_query, expires_at).as_bytes());
    mac
  }

  pub fn signature(&self, path: &str, expires_at: i64) -> String {
    hex::encode(self.mac(path, expires_at).finalize().into_bytes())
  }

  /// `path` with a signature valid for `ttl` from now.
  pub fn sign(&self, path: &str, ttl: Duration) -> String {
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    self.sign_until(path, Utc::now().timestamp().saturating_add(ttl_secs))
  }

  pub fn sign_until(&self, path: &str, expires_at: i64) -> String {
    format!(
      "{}?{}={}&{}={}",
      path,
      EXPIRY_PARAM,
      expires_at,
      SIGNATURE_PARAM,
      self.signature(path, expires_at)
    )
  }

  /// `path?{params}` with a signature over the path, the params and the expiry.
  ///
  /// Values go into the URL as given, so they must already be URL-safe.
  pub fn sign_action(&self, path: &str, params: &[(&str, &str)], ttl: Duration) -> String {
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    self.sign_action_until(path, params, Utc::now().timestamp().saturating_add(ttl_secs))
  }

  pub fn sign_action_until(&self, path: &str, params: &[(&str, &str)], expires_at: i64) -> String {
    let canonical = canonical_query(params.iter().copied());
    let signature = hex::encode(self.action_mac(path, &canonical, expires_at).finalize().into_bytes());
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!(
      "{}?{}&{}={}&{}={}",
      path,
      query.join("&"),
      EXPIRY_PARAM,
      expires_at,
      SIGNATURE_PARAM,
      signature
    )
  }

  /// Checks the `_exp`/`_sig` pair of a request for `path` at `now` (unix seconds).
  pub fn verify(&self, path: &str, expires_at: Option<&str>, signature: Option<&str>, now: i64) -> Result<()> {
    let (expires_at, signature) = parse_signature(expires_at, signature, now)?;
    self
      .mac(path, expires_at)
      .verify_slice(&signature)
      .map_err(|_| AppError::Auth("Invalid URL signature".to_string()))
  }

  /// Like `verify`, but every decoded query pair other than `_exp`/`_sig` must be
  /// exactly the set that was signed. Repeated keys count individually.
  pub fn verify_action(&self, path: &str, query: &[(String, String)], now: i64) -> Result<()> {
    let param = |name: &str| query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
    let (expires_at, signature) = parse_signature(param(EXPIRY_PARAM), param(SIGNATURE_PARAM), now)?;
    let canonical = canonical_query(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    self
      .action_mac(path, &canonical, expires_at)
      .verify_slice(&signature)
      .map_err(|_| AppError::Auth("Invalid URL signature".to_string()))
  }
}

fn parse_signature(expires_at: Option<&str>, signature: Option<&str>, now: i64) -> Result<(i64, Vec<u8>)> {
  let (Some(expires_at), Some(signature)) = (expires_at, signature) else {
    return Err(AppError::Auth("Missing URL signature".to_string()));
  };
  let expires_at: i64 = expires_at
    .parse()
    .map_err(|_| AppError::Auth("Malformed URL expiry".to_string()))?;
  if expires_at < now {
    return Err(AppError::Auth("URL signature expired".to_string()));
  }
  let signature = hex::decode(signature).map_err(|_| AppError::Auth("Malformed URL signature".to_string()))?;
  Ok((expires_at, signature))
}

fn canonical_query<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
  let mut pairs: Vec<String> = pairs
    .filter(|(k, _)| *k != EXPIRY_PARAM && *k != SIGNATURE_PARAM)
    .map(|(k, v)| format!("{}={}", k, v))
    .collect();
  pairs.sort();
  pairs.join("&")
}
