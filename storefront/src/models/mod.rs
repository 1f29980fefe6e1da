// storefront/src/models/mod.rs

//! Catalog, cart and order types shared by the stores, pipelines and handlers.

pub mod cart_item;
pub mod line_item;
pub mod money;
pub mod order;
pub mod product;

pub use cart_item::{normalize_requests, validate_cart, CartItem, StockRequest};
pub use line_item::LineItem;
pub use order::{CancelOutcome, Order, OrderStatus, PaymentTransition};
pub use product::{Product, ProductDraft, ProductEdit, ProductField};
