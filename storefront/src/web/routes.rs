// storefront/src/web/routes.rs

use actix_web::{web, HttpResponse};

use crate::errors::AppError;
use crate::web::handlers::{admin_handlers, checkout_handlers, payment_callback_handlers, product_handlers};

// Product images arrive as data URLs inside JSON bodies.
const JSON_BODY_LIMIT: usize = 8 * 1024 * 1024;

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(
      web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| AppError::Validation(format!("Invalid JSON body: {}", err)).into()),
    )
    .route("/health", web::get().to(health_check_handler))
    // Storefront
    .route("/index", web::get().to(product_handlers::index_handler))
    .route("/products", web::get().to(product_handlers::products_handler))
    .route("/checkout", web::post().to(checkout_handlers::checkout_handler))
    .route("/pay", web::post().to(checkout_handlers::pay_handler))
    // Payment provider redirects
    .route(
      "/successful_payment/{order_id}",
      web::get().to(payment_callback_handlers::successful_payment_handler),
    )
    .route(
      "/cancelled_payment/{order_id}",
      web::get().to(payment_callback_handlers::cancelled_payment_handler),
    )
    // Staff
    .route("/manage_products", web::get().to(admin_handlers::manage_products_handler))
    .route("/load_products", web::get().to(admin_handlers::load_products_handler))
    .route("/add_product", web::post().to(admin_handlers::add_product_handler))
    .route("/delete_product", web::get().to(admin_handlers::delete_product_handler))
    .route("/edit_product", web::post().to(admin_handlers::edit_product_handler))
    .route("/upload_image", web::post().to(admin_handlers::upload_image_handler))
    .route("/view_orders", web::get().to(admin_handlers::view_orders_handler));
}
