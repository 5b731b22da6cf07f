//! Order persistence: the checkout transaction, admin status updates and
//! idempotent webhook application.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::cart::{price_lines, CartOwner};
use crate::domain::order::{
    new_order_number, status_for_event, webhook_transition, Order, OrderLineItem, OrderStatus,
    PaymentMethod, WebhookEvent,
};
use crate::error::{Error, Result};
use crate::gateway::{CheckoutSession, Gateway, OrderDraft};

/// Converts the customer's cart into an order under one transaction: price
/// the lines (wholesale at the aggregate threshold), decrement stock through
/// the guarded ledger update, freeze unit prices into line items, and empty
/// the cart. Any refused decrement rolls the whole checkout back.
pub async fn checkout(
    pool: &PgPool,
    gateway: &Gateway,
    customer_id: Uuid,
) -> Result<(Order, CheckoutSession)> {
    let owner = CartOwner::Customer { id: customer_id };
    let cart = super::cart::get_or_create(pool, &owner).await?;
    let resolved = super::cart::resolved_lines(pool, cart.id).await?;
    if resolved.is_empty() {
        return Err(Error::InvalidRequest("cart is empty".to_string()));
    }
    let (mode, priced, total) = price_lines(&resolved);

    let order_id = Uuid::now_v7();
    let order_number = new_order_number();
    let method = gateway.payment_method();
    // The gateway call happens before the transaction opens; a failure here
    // leaves no local state behind.
    let session = gateway
        .create_checkout(&OrderDraft {
            order_id,
            order_number: order_number.clone(),
            total,
        })
        .await?;
    let (checkout_session_id, payment_reference) = match method {
        PaymentMethod::Hosted => (Some(session.correlation_id.as_str()), None),
        PaymentMethod::Manual => (None, Some(session.correlation_id.as_str())),
    };

    let mut tx = pool.begin().await?;
    for line in &priced {
        super::catalog::decrement_stock(&mut *tx, line.variant_id, &line.size, line.quantity)
            .await?;
    }
    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, order_number, cart_id, customer_id, status, total, \
         payment_method, checkout_session_id, payment_reference, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING *",
    )
    .bind(order_id)
    .bind(&order_number)
    .bind(cart.id)
    .bind(customer_id)
    .bind(method.initial_status().as_str())
    .bind(total)
    .bind(method.as_str())
    .bind(checkout_session_id)
    .bind(payment_reference)
    .fetch_one(&mut *tx)
    .await?;
    for line in &priced {
        sqlx::query(
            "INSERT INTO order_line_items (id, order_id, variant_id, size, quantity, unit_price) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(line.variant_id)
        .bind(&line.size)
        .bind(line.quantity as i32)
        .bind(line.unit_price)
        .execute(&mut *tx)
        .await?;
    }
    sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
        .bind(cart.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE carts SET status = 'empty', updated_at = NOW() WHERE id = $1")
        .bind(cart.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(
        order = %order.order_number,
        mode = ?mode,
        total = %total,
        "checkout completed"
    );
    Ok((order, session))
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("order"))
}

pub async fn list(
    pool: &PgPool,
    customer_id: Option<Uuid>,
    page: u32,
    per_page: u32,
) -> Result<(Vec<Order>, i64)> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE ($1::uuid IS NULL OR customer_id = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(customer_id)
    .bind(per_page as i64)
    .bind(super::page_offset(page, per_page))
    .fetch_all(pool)
    .await?;
    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::uuid IS NULL OR customer_id = $1)")
            .bind(customer_id)
            .fetch_one(pool)
            .await?;
    Ok((orders, total))
}

pub async fn line_items(pool: &PgPool, order_id: Uuid) -> Result<Vec<OrderLineItem>> {
    let items = sqlx::query_as::<_, OrderLineItem>(
        "SELECT * FROM order_line_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

/// Admin status update. The label must be recognized; beyond that any status
/// may follow any other (the permissive graph is deliberate, see DESIGN.md).
pub async fn set_status(
    pool: &PgPool,
    order_id: Uuid,
    label: &str,
) -> Result<(Order, OrderStatus, OrderStatus)> {
    let target = OrderStatus::parse(label)?;
    let mut tx = pool.begin().await?;
    let current = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::NotFound("order"))?;
    let from = OrderStatus::parse(&current.status)?;
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .bind(target.as_str())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok((order, from, target))
}

/// Applies a verified gateway event. Redelivery of an already-applied event
/// is a no-op (`Ok(None)`), as is an event type we do not recognize; the
/// caller acknowledges either way so the gateway stops retrying.
pub async fn apply_webhook_event(
    pool: &PgPool,
    event: &WebhookEvent,
) -> Result<Option<(Order, OrderStatus, OrderStatus)>> {
    let Some(target) = status_for_event(event) else {
        tracing::info!(
            event_type = %event.event_type,
            correlation_id = %event.correlation_id,
            "ignoring unrecognized gateway event"
        );
        return Ok(None);
    };
    let mut tx = pool.begin().await?;
    let current = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE checkout_session_id = $1 FOR UPDATE",
    )
    .bind(&event.correlation_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(Error::NotFound("order"))?;
    let from = OrderStatus::parse(&current.status)?;
    let Some(to) = webhook_transition(from, target) else {
        tracing::info!(
            order = %current.order_number,
            status = from.as_str(),
            "webhook redelivery, status already applied"
        );
        return Ok(None);
    };
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(current.id)
    .bind(to.as_str())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Some((order, from, to)))
}
