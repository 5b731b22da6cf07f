//! Checkout, order queries, admin status updates and the gateway webhook.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Actor, AppState, PaginatedResponse};
use crate::domain::order::{Order, OrderLineItem, PaymentMethod};
use crate::error::{Error, Result};
use crate::events::OrderEvent;
use crate::gateway::CheckoutSession;
use crate::repo;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub line_items: Vec<OrderLineItem>,
    pub session: CheckoutSession,
}

pub async fn checkout(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let customer_id = actor.require_customer()?;
    let gateway = state.gateway(req.payment_method);
    let (order, session) = repo::order::checkout(&state.db, &gateway, customer_id).await?;
    let line_items = repo::order::line_items(&state.db, order.id).await?;
    state
        .events
        .publish(OrderEvent::Created {
            order_id: order.id,
            order_number: order.order_number.clone(),
            total: order.total,
        })
        .await;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order,
            line_items,
            session,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<OrderListParams>,
) -> Result<Json<PaginatedResponse<Order>>> {
    // Admins see every order, customers only their own.
    let customer_filter = match &actor {
        Actor::Admin(_) => None,
        Actor::Customer(id) => Some(*id),
        Actor::Guest(_) => return Err(Error::Forbidden),
    };
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);
    let (orders, total) = repo::order::list(&state.db, customer_filter, page, per_page).await?;
    Ok(Json(PaginatedResponse {
        data: orders,
        total,
        page,
    }))
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub line_items: Vec<OrderLineItem>,
}

pub async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>> {
    let order = repo::order::get(&state.db, id).await?;
    match &actor {
        Actor::Admin(_) => {}
        Actor::Customer(customer_id) if *customer_id == order.customer_id => {}
        _ => return Err(Error::Forbidden),
    }
    let line_items = repo::order::line_items(&state.db, id).await?;
    Ok(Json(OrderView { order, line_items }))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub async fn set_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Order>> {
    actor.require_admin()?;
    let (order, from, to) = repo::order::set_status(&state.db, id, &req.status).await?;
    state
        .events
        .publish(OrderEvent::StatusChanged {
            order_id: order.id,
            from,
            to,
        })
        .await;
    Ok(Json(order))
}

/// Hosted-gateway webhook. The signature over the raw body is verified
/// before anything is parsed; a mismatch is rejected outright. A 2xx is
/// returned only once the transition is durable, so the gateway's own retry
/// loop covers transient failures on our side.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get("x-gateway-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::SignatureMismatch)?;
    let gateway = state.gateway(PaymentMethod::Hosted);
    let event = gateway.verify_and_parse_webhook(&body, signature)?;
    if let Some((order, from, to)) = repo::order::apply_webhook_event(&state.db, &event).await? {
        state
            .events
            .publish(OrderEvent::StatusChanged {
                order_id: order.id,
                from,
                to,
            })
            .await;
    }
    Ok(Json(serde_json::json!({ "received": true })))
}
