// storefront/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::Product;
use crate::state::AppState;
use crate::web::extractors::SignedRequest;

#[derive(Deserialize, Debug)]
pub struct IndexQuery {
  pub clear_cart: Option<String>,
}

/// Entry point for the browser: fresh signed URLs for the storefront's API.
#[instrument(name = "handler::index", skip_all)]
pub async fn index_handler(app_state: web::Data<AppState>, query: web::Query<IndexQuery>) -> HttpResponse {
  let signer = &app_state.signer;
  let ttl = app_state.config.signed_url_ttl;
  HttpResponse::Ok().json(json!({
      "products_url": signer.sign("/products", ttl),
      "checkout_url": signer.sign("/checkout", ttl),
      "pay_url": signer.sign("/pay", ttl),
      "clear_cart": query.clear_cart.is_some(),
      "payment_public_key": app_state.gateway.public_key(),
  }))
}

#[derive(Deserialize, Debug)]
pub struct ProductsQuery {
  pub q: Option<String>,
}

/// A product plus the fields the browser cart widget starts from.
#[derive(Serialize, Debug)]
pub struct ProductListing {
  #[serde(flatten)]
  pub product: Product,
  pub desired_quantity: i32,
  pub cart_quantity: i32,
}

impl From<Product> for ProductListing {
  fn from(product: Product) -> Self {
    Self {
      desired_quantity: product.quantity.min(1),
      cart_quantity: 0,
      product,
    }
  }
}

#[instrument(name = "handler::products", skip(app_state, _signed), fields(q = ?query.q))]
pub async fn products_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  query: web::Query<ProductsQuery>,
) -> Result<HttpResponse, AppError> {
  let products = app_state.catalog.search(query.q.as_deref()).await?;
  info!(count = products.len(), "Products fetched.");
  let listings: Vec<ProductListing> = products.into_iter().map(ProductListing::from).collect();
  Ok(HttpResponse::Ok().json(json!({ "products": listings })))
}
