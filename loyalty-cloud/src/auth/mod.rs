//! Authentication middleware for the merchant API

pub mod merchant_auth;

pub use merchant_auth::MerchantIdentity;
