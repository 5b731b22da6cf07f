//! HTTP surface: routing, shared state and actor resolution.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    Json, Router,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::cart::CartOwner;
use crate::domain::order::PaymentMethod;
use crate::error::Error;
use crate::events::EventPublisher;
use crate::gateway::Gateway;
use crate::storage::BlobStore;

mod cart;
mod catalog;
mod gallery;
mod orders;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub blobs: BlobStore,
    pub events: EventPublisher,
    pub config: Config,
}

impl AppState {
    pub fn gateway(&self, method: PaymentMethod) -> Gateway {
        Gateway::for_method(
            method,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_secs,
        )
    }
}

/// Request actor, as resolved by the upstream auth layer. The service trusts
/// these headers; credential checking happens before requests reach it.
#[derive(Clone, Debug)]
pub enum Actor {
    Customer(Uuid),
    Guest(String),
    Admin(Uuid),
}

impl Actor {
    pub fn require_admin(&self) -> Result<Uuid, Error> {
        match self {
            Self::Admin(id) => Ok(*id),
            _ => Err(Error::Forbidden),
        }
    }

    pub fn require_customer(&self) -> Result<Uuid, Error> {
        match self {
            Self::Customer(id) => Ok(*id),
            _ => Err(Error::Forbidden),
        }
    }

    /// The cart this actor owns. Admins have no cart of their own.
    pub fn cart_owner(&self) -> Result<CartOwner, Error> {
        match self {
            Self::Customer(id) => Ok(CartOwner::Customer { id: *id }),
            Self::Guest(key) => Ok(CartOwner::Guest {
                session_key: key.clone(),
            }),
            Self::Admin(_) => Err(Error::Forbidden),
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        if let Some(raw) = header("x-admin-id") {
            let id = raw.parse().map_err(|_| Error::Unauthorized)?;
            return Ok(Self::Admin(id));
        }
        if let Some(raw) = header("x-customer-id") {
            let id = raw.parse().map_err(|_| Error::Unauthorized)?;
            return Ok(Self::Customer(id));
        }
        if let Some(key) = header("x-session-key") {
            if !key.is_empty() {
                return Ok(Self::Guest(key));
            }
        }
        Err(Error::Unauthorized)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }),
        )
        .route(
            "/api/v1/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/api/v1/products/:id",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route(
            "/api/v1/products/:id/variants",
            get(catalog::list_variants).post(catalog::create_variant),
        )
        .route(
            "/api/v1/variants/:id",
            get(catalog::get_variant)
                .put(catalog::update_variant)
                .delete(catalog::delete_variant),
        )
        .route("/api/v1/variants/:id/stock", put(catalog::bulk_set_stock))
        .route("/api/v1/variants/:id/stock/:size", get(catalog::stock_of))
        .route(
            "/api/v1/variants/:id/stock/decrement",
            post(catalog::decrement_stock),
        )
        .route(
            "/api/v1/variants/:id/stock/increment",
            post(catalog::increment_stock),
        )
        .route(
            "/api/v1/variants/:id/images",
            get(gallery::list_images).post(gallery::add_image),
        )
        .route("/api/v1/variants/:id/images/order", put(gallery::reorder))
        .route("/api/v1/images/:id", axum::routing::delete(gallery::remove_image))
        .route(
            "/api/v1/cart",
            get(cart::get_cart).delete(cart::clear_cart),
        )
        .route(
            "/api/v1/cart/lines",
            post(cart::add_line)
                .put(cart::update_quantity)
                .delete(cart::remove_line),
        )
        .route("/api/v1/checkout", post(orders::checkout))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/status", put(orders::set_status))
        .route("/api/v1/webhooks/payment", post(orders::payment_webhook))
        .with_state(state)
}
