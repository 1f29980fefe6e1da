// storefront/src/services/mod.rs

pub mod payment_gateway;
pub mod url_signer;

pub use payment_gateway::{
  build_gateway, CheckoutRequest, GatewayLineItem, MockPaymentGateway, PaymentGateway, PaymentSession, StripeGateway,
};
pub use url_signer::UrlSigner;
