//! Cart handlers. Every operation resolves the cart through the actor's own
//! ownership, so one customer can never address another's cart.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Actor, AppState};
use crate::domain::cart::{price_lines, Cart, CartLine, PricedLine};
use crate::domain::catalog::PricingMode;
use crate::error::Result;
use crate::repo;
use rust_decimal::Decimal;

#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub lines: Vec<CartLine>,
    pub pricing_mode: PricingMode,
    pub priced_lines: Vec<PricedLine>,
    pub total: Decimal,
}

async fn view(state: &AppState, cart: Cart) -> Result<CartView> {
    let resolved = repo::cart::resolved_lines(&state.db, cart.id).await?;
    let (pricing_mode, priced_lines, total) = price_lines(&resolved);
    Ok(CartView {
        lines: resolved.iter().map(|(l, _, _)| l.clone()).collect(),
        cart,
        pricing_mode,
        priced_lines,
        total,
    })
}

pub async fn get_cart(State(state): State<AppState>, actor: Actor) -> Result<Json<CartView>> {
    let owner = actor.cart_owner()?;
    let cart = repo::cart::get_or_create(&state.db, &owner).await?;
    Ok(Json(view(&state, cart).await?))
}

#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub variant_id: Uuid,
    pub size: String,
    pub quantity: u32,
}

pub async fn add_line(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<LineRequest>,
) -> Result<(StatusCode, Json<CartView>)> {
    let owner = actor.cart_owner()?;
    let cart = repo::cart::get_or_create(&state.db, &owner).await?;
    repo::cart::add_line(&state.db, cart.id, req.variant_id, &req.size, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(view(&state, cart).await?)))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<LineRequest>,
) -> Result<Json<CartView>> {
    let owner = actor.cart_owner()?;
    let cart = repo::cart::get_or_create(&state.db, &owner).await?;
    repo::cart::update_quantity(&state.db, cart.id, req.variant_id, &req.size, req.quantity)
        .await?;
    Ok(Json(view(&state, cart).await?))
}

#[derive(Debug, Deserialize)]
pub struct RemoveLineRequest {
    pub variant_id: Uuid,
    pub size: String,
}

pub async fn remove_line(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<RemoveLineRequest>,
) -> Result<Json<CartView>> {
    let owner = actor.cart_owner()?;
    let cart = repo::cart::get_or_create(&state.db, &owner).await?;
    repo::cart::remove_line(&state.db, cart.id, req.variant_id, &req.size).await?;
    Ok(Json(view(&state, cart).await?))
}

pub async fn clear_cart(State(state): State<AppState>, actor: Actor) -> Result<StatusCode> {
    let owner = actor.cart_owner()?;
    let cart = repo::cart::get_or_create(&state.db, &owner).await?;
    repo::cart::clear(&state.db, cart.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
