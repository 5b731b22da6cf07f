//! Product, variant and stock-ledger handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Actor, AppState, PaginatedResponse};
use crate::domain::catalog::{self, Product, Variant};
use crate::error::Result;
use crate::repo;

/// Product plus its catalog-level derived fields.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub stock_total: u32,
    pub principal_variant: Option<Uuid>,
}

async fn product_view(state: &AppState, product: Product) -> Result<ProductView> {
    let variants = repo::catalog::list_variants(&state.db, product.id).await?;
    Ok(ProductView {
        stock_total: catalog::stock_total(&variants),
        principal_variant: catalog::principal_variant(&variants).map(|v| v.id),
        product,
    })
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<repo::catalog::ListFilter>,
) -> Result<Json<PaginatedResponse<Product>>> {
    let page = filter.page.unwrap_or(1).max(1);
    let (products, total) = repo::catalog::list_products(&state.db, &filter).await?;
    Ok(Json(PaginatedResponse {
        data: products,
        total,
        page,
    }))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductView>> {
    let product = repo::catalog::get_product(&state.db, id).await?;
    Ok(Json(product_view(&state, product).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<repo::catalog::NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    actor.require_admin()?;
    let product = repo::catalog::create_product(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<repo::catalog::NewProduct>,
) -> Result<Json<Product>> {
    actor.require_admin()?;
    let product = repo::catalog::update_product(&state.db, id, &req).await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    actor.require_admin()?;
    repo::catalog::soft_delete_product(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_variants(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<Variant>>> {
    repo::catalog::get_product(&state.db, product_id).await?;
    let variants = repo::catalog::list_variants(&state.db, product_id).await?;
    Ok(Json(variants))
}

pub async fn create_variant(
    State(state): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
    Json(req): Json<repo::catalog::NewVariant>,
) -> Result<(StatusCode, Json<Variant>)> {
    actor.require_admin()?;
    let variant = repo::catalog::create_variant(&state.db, product_id, &req).await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

pub async fn get_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Variant>> {
    let variant = repo::catalog::get_variant(&state.db, id).await?;
    Ok(Json(variant))
}

pub async fn update_variant(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<repo::catalog::NewVariant>,
) -> Result<Json<Variant>> {
    actor.require_admin()?;
    let variant = repo::catalog::update_variant(&state.db, id, &req).await?;
    Ok(Json(variant))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    actor.require_admin()?;
    repo::catalog::soft_delete_variant(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct StockView {
    pub variant_id: Uuid,
    pub size: String,
    pub stock: u32,
}

pub async fn stock_of(
    State(state): State<AppState>,
    Path((id, size)): Path<(Uuid, String)>,
) -> Result<Json<StockView>> {
    let stock = repo::catalog::stock_of(&state.db, id, &size).await?;
    Ok(Json(StockView {
        variant_id: id,
        size,
        stock,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StockChange {
    pub size: String,
    pub quantity: u32,
}

pub async fn decrement_stock(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<StockChange>,
) -> Result<Json<StockView>> {
    actor.require_admin()?;
    let mut conn = state.db.acquire().await?;
    repo::catalog::decrement_stock(&mut conn, id, &req.size, req.quantity).await?;
    drop(conn);
    let stock = repo::catalog::stock_of(&state.db, id, &req.size).await?;
    Ok(Json(StockView {
        variant_id: id,
        size: req.size,
        stock,
    }))
}

pub async fn increment_stock(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<StockChange>,
) -> Result<Json<StockView>> {
    actor.require_admin()?;
    let mut conn = state.db.acquire().await?;
    repo::catalog::increment_stock(&mut conn, id, &req.size, req.quantity).await?;
    drop(conn);
    let stock = repo::catalog::stock_of(&state.db, id, &req.size).await?;
    Ok(Json(StockView {
        variant_id: id,
        size: req.size,
        stock,
    }))
}

pub async fn bulk_set_stock(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(raw): Json<Value>,
) -> Result<Json<Variant>> {
    actor.require_admin()?;
    let variant = repo::catalog::bulk_set_stock(&state.db, id, &raw).await?;
    Ok(Json(variant))
}
