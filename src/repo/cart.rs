//! Cart persistence: one cart per owner, merged lines, catalog resolution.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::cart::{Cart, CartLine, CartOwner};
use crate::domain::catalog::{Product, Variant};
use crate::error::{Error, Result};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    customer_id: Option<Uuid>,
    session_key: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self) -> Result<Cart> {
        Ok(Cart {
            id: self.id,
            owner: CartOwner::from_columns(self.customer_id, self.session_key)?,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn owner_columns(owner: &CartOwner) -> (Option<Uuid>, Option<&str>) {
    match owner {
        CartOwner::Customer { id } => (Some(*id), None),
        CartOwner::Guest { session_key } => (None, Some(session_key.as_str())),
    }
}

/// The cart for an owner, created lazily on first use.
pub async fn get_or_create(pool: &PgPool, owner: &CartOwner) -> Result<Cart> {
    let (customer_id, session_key) = owner_columns(owner);
    let row = sqlx::query_as::<_, CartRow>(
        "SELECT * FROM carts WHERE ($1::uuid IS NOT NULL AND customer_id = $1) \
         OR ($2::text IS NOT NULL AND session_key = $2)",
    )
    .bind(customer_id)
    .bind(session_key)
    .fetch_optional(pool)
    .await?;
    if let Some(row) = row {
        return row.into_cart();
    }
    let inserted = sqlx::query_as::<_, CartRow>(
        "INSERT INTO carts (id, customer_id, session_key, status, created_at, updated_at) \
         VALUES ($1, $2, $3, 'empty', NOW(), NOW()) \
         ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(customer_id)
    .bind(session_key)
    .fetch_optional(pool)
    .await?;
    match inserted {
        Some(row) => row.into_cart(),
        // Lost a concurrent creation race: the other request's row is ours too.
        None => sqlx::query_as::<_, CartRow>(
            "SELECT * FROM carts WHERE ($1::uuid IS NOT NULL AND customer_id = $1) \
             OR ($2::text IS NOT NULL AND session_key = $2)",
        )
        .bind(customer_id)
        .bind(session_key)
        .fetch_one(pool)
        .await?
        .into_cart(),
    }
}

pub async fn lines(pool: &PgPool, cart_id: Uuid) -> Result<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
        "SELECT * FROM cart_lines WHERE cart_id = $1 ORDER BY created_at",
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;
    Ok(lines)
}

/// Adds a line, merging quantity into an existing (variant, size) line.
/// Availability is not checked here; checkout is where stock is enforced.
pub async fn add_line(
    pool: &PgPool,
    cart_id: Uuid,
    variant_id: Uuid,
    size: &str,
    quantity: u32,
) -> Result<CartLine> {
    if quantity == 0 {
        return Err(Error::InvalidRequest("quantity must be positive".to_string()));
    }
    super::catalog::get_variant(pool, variant_id).await?;
    let mut tx = pool.begin().await?;
    let line = sqlx::query_as::<_, CartLine>(
        "INSERT INTO cart_lines (id, cart_id, variant_id, size, quantity, created_at) \
         VALUES ($1, $2, $3, $4, $5, NOW()) \
         ON CONFLICT (cart_id, variant_id, size) \
         DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(cart_id)
    .bind(variant_id)
    .bind(size)
    .bind(quantity as i32)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE carts SET status = 'active', updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(line)
}

/// Sets a line to an exact quantity; zero removes the line.
pub async fn update_quantity(
    pool: &PgPool,
    cart_id: Uuid,
    variant_id: Uuid,
    size: &str,
    quantity: u32,
) -> Result<()> {
    if quantity == 0 {
        return remove_line(pool, cart_id, variant_id, size).await;
    }
    let updated = sqlx::query(
        "UPDATE cart_lines SET quantity = $4 \
         WHERE cart_id = $1 AND variant_id = $2 AND size = $3",
    )
    .bind(cart_id)
    .bind(variant_id)
    .bind(size)
    .bind(quantity as i32)
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::NotFound("cart line"));
    }
    Ok(())
}

pub async fn remove_line(pool: &PgPool, cart_id: Uuid, variant_id: Uuid, size: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    let removed =
        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND variant_id = $2 AND size = $3")
            .bind(cart_id)
            .bind(variant_id)
            .bind(size)
            .execute(&mut *tx)
            .await?;
    if removed.rows_affected() == 0 {
        return Err(Error::NotFound("cart line"));
    }
    sqlx::query(
        "UPDATE carts SET status = CASE \
         WHEN EXISTS (SELECT 1 FROM cart_lines WHERE cart_id = $1) THEN 'active' ELSE 'empty' END, \
         updated_at = NOW() WHERE id = $1",
    )
    .bind(cart_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn clear(pool: &PgPool, cart_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE carts SET status = 'empty', updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Cart lines joined against their live variant and product rows, ready for
/// pricing. A line pointing at a tombstoned variant fails the whole load.
pub async fn resolved_lines(
    pool: &PgPool,
    cart_id: Uuid,
) -> Result<Vec<(CartLine, Variant, Product)>> {
    let cart_lines = lines(pool, cart_id).await?;
    let mut resolved = Vec::with_capacity(cart_lines.len());
    for line in cart_lines {
        let variant = super::catalog::get_variant(pool, line.variant_id).await?;
        let product = super::catalog::get_product(pool, variant.product_id).await?;
        resolved.push((line, variant, product));
    }
    Ok(resolved)
}
