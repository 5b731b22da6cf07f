//! Storefront service: product catalog with color/size variants, guest and
//! customer carts, checkout with wholesale pricing, order lifecycle driven by
//! admin action and payment-gateway webhooks, and per-variant image galleries.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http;
pub mod repo;
pub mod storage;

pub use error::{Error, Result};
