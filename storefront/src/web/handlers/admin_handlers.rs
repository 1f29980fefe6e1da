// storefront/src/web/handlers/admin_handlers.rs

//! Catalog maintenance and the order list for staff.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::{Product, ProductDraft, ProductEdit};
use crate::state::AppState;
use crate::web::extractors::{parse_id, SignedAction, SignedRequest};

#[instrument(name = "handler::manage_products", skip_all)]
pub async fn manage_products_handler(_signed: SignedRequest, app_state: web::Data<AppState>) -> HttpResponse {
  let signer = &app_state.signer;
  let ttl = app_state.config.signed_url_ttl;
  HttpResponse::Ok().json(json!({
      "load_url": signer.sign("/load_products", ttl),
      "add_url": signer.sign("/add_product", ttl),
      "edit_url": signer.sign("/edit_product", ttl),
      "upload_url": signer.sign("/upload_image", ttl),
      "orders_url": signer.sign("/view_orders", ttl),
  }))
}

#[instrument(name = "handler::load_products", skip_all)]
pub async fn load_products_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
  let ttl = app_state.config.signed_url_ttl;
  let products = app_state.catalog.search(None).await?;
  let rows: Vec<ManagedProduct> = products
    .iter()
    .map(|product| ManagedProduct {
      delete_url: app_state
        .signer
        .sign_action("/delete_product", &[("id", product.id.to_string().as_str())], ttl),
      product,
    })
    .collect();
  Ok(HttpResponse::Ok().json(json!({ "rows": rows })))
}

/// A catalog row plus the link that deletes exactly that product.
#[derive(Serialize)]
struct ManagedProduct<'a> {
  #[serde(flatten)]
  product: &'a Product,
  delete_url: String,
}

#[instrument(name = "handler::add_product", skip_all, fields(name = %payload.name))]
pub async fn add_product_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  payload: web::Json<ProductDraft>,
) -> Result<HttpResponse, AppError> {
  let draft = payload.into_inner().validate()?;
  let product = app_state.catalog.add(draft).await?;
  info!(product_id = product.id, "Product added.");
  Ok(HttpResponse::Ok().json(json!({ "id": product.id })))
}

#[derive(Deserialize, Debug)]
pub struct DeleteProductQuery {
  pub id: Option<String>,
}

#[instrument(name = "handler::delete_product", skip(app_state, _signed))]
pub async fn delete_product_handler(
  _signed: SignedAction,
  app_state: web::Data<AppState>,
  query: web::Query<DeleteProductQuery>,
) -> Result<HttpResponse, AppError> {
  let raw_id = query
    .id
    .as_deref()
    .ok_or_else(|| AppError::Validation("Missing product id".to_string()))?;
  let product_id = parse_id(raw_id, "product id")?;
  if !app_state.catalog.delete(product_id).await? {
    return Err(AppError::NotFound(format!("Product {} not found", product_id)));
  }
  info!(product_id, "Product deleted.");
  Ok(HttpResponse::Ok().body("ok"))
}

#[derive(Deserialize, Debug)]
pub struct EditProductPayload {
  pub id: i64,
  pub field: String,
  #[serde(default)]
  pub value: Value,
}

#[instrument(name = "handler::edit_product", skip(app_state, _signed, payload), fields(product_id = payload.id, field = %payload.field))]
pub async fn edit_product_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  payload: web::Json<EditProductPayload>,
) -> Result<HttpResponse, AppError> {
  let edit = ProductEdit::parse(&payload.field, &payload.value).map_err(|e| {
    warn!(error = %e, "Rejected product edit.");
    e
  })?;
  let product = app_state.catalog.edit(payload.id, &edit).await?;
  Ok(HttpResponse::Ok().json(json!({ "ok": true, "product": product })))
}

#[derive(Deserialize)]
pub struct UploadImagePayload {
  pub product_id: i64,
  pub image: String,
}

#[instrument(name = "handler::upload_image", skip_all, fields(product_id = payload.product_id, bytes = payload.image.len()))]
pub async fn upload_image_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
  payload: web::Json<UploadImagePayload>,
) -> Result<HttpResponse, AppError> {
  let UploadImagePayload { product_id, image } = payload.into_inner();
  if !image.starts_with("data:image/") {
    return Err(AppError::Validation("Image must be a data:image/ URL".to_string()));
  }
  app_state.catalog.set_image(product_id, image).await?;
  Ok(HttpResponse::Ok().body("ok"))
}

#[instrument(name = "handler::view_orders", skip_all)]
pub async fn view_orders_handler(
  _signed: SignedRequest,
  app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.list().await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}
