//! Product and variant persistence, including the stock ledger.
//!
//! Stock mutation is the one place needing cross-request mutual exclusion:
//! the decrement is a single conditional UPDATE so that two concurrent
//! checkouts can never both succeed past the available quantity.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::catalog::{Product, SizeStock, Variant, DEFAULT_COLOR};
use crate::domain::gallery::slugify;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub wholesale_price: Decimal,
    #[serde(default)]
    pub on_offer: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewVariant {
    pub color: Option<String>,
    #[serde(default)]
    pub sizes_stock: Value,
    pub price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub is_principal: bool,
    pub sku: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

pub async fn create_product(pool: &PgPool, req: &NewProduct) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, slug, description, brand, gender, category, price, \
         wholesale_price, on_offer, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'active', NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(slugify(&req.name))
    .bind(&req.description)
    .bind(&req.brand)
    .bind(&req.gender)
    .bind(&req.category)
    .bind(req.price)
    .bind(req.wholesale_price)
    .bind(req.on_offer)
    .fetch_one(pool)
    .await?;
    Ok(product)
}

pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status <> 'deleted'")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("product"))
}

pub async fn list_products(pool: &PgPool, filter: &ListFilter) -> Result<(Vec<Product>, i64)> {
    let page = filter.page.unwrap_or(1).max(1);
    let per_page = filter.per_page.unwrap_or(20).min(100);
    let search = filter.search.as_ref().map(|s| format!("%{s}%"));

    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'active' \
         AND ($1::text IS NULL OR category = $1) \
         AND ($2::text IS NULL OR name ILIKE $2) \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(&filter.category)
    .bind(&search)
    .bind(per_page as i64)
    .bind(super::page_offset(page, per_page))
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE status = 'active' \
         AND ($1::text IS NULL OR category = $1) \
         AND ($2::text IS NULL OR name ILIKE $2)",
    )
    .bind(&filter.category)
    .bind(&search)
    .fetch_one(pool)
    .await?;

    Ok((products, total))
}

pub async fn update_product(pool: &PgPool, id: Uuid, req: &NewProduct) -> Result<Product> {
    sqlx::query_as::<_, Product>(
        "UPDATE products SET name = $2, slug = $3, description = $4, brand = $5, gender = $6, \
         category = $7, price = $8, wholesale_price = $9, on_offer = $10, updated_at = NOW() \
         WHERE id = $1 AND status <> 'deleted' RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(slugify(&req.name))
    .bind(&req.description)
    .bind(&req.brand)
    .bind(&req.gender)
    .bind(&req.category)
    .bind(req.price)
    .bind(req.wholesale_price)
    .bind(req.on_offer)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("product"))
}

/// Tombstones the product and its variants. Order line items keep pointing at
/// the tombstoned rows so historical orders stay intact.
pub async fn soft_delete_product(pool: &PgPool, id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;
    let updated = sqlx::query("UPDATE products SET status = 'deleted', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::NotFound("product"));
    }
    sqlx::query("UPDATE variants SET status = 'deleted', updated_at = NOW() WHERE product_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn create_variant(pool: &PgPool, product_id: Uuid, req: &NewVariant) -> Result<Variant> {
    let empty = Value::Object(Default::default());
    let raw = if req.sizes_stock.is_null() {
        &empty
    } else {
        &req.sizes_stock
    };
    let sizes = SizeStock::from_value(raw)?;
    let mut tx = pool.begin().await?;
    // The product must exist and a flagged principal displaces any previous one.
    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM products WHERE id = $1 AND status <> 'deleted'")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
    if exists.is_none() {
        return Err(Error::NotFound("product"));
    }
    if req.is_principal {
        sqlx::query("UPDATE variants SET is_principal = FALSE WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
    }
    let variant = sqlx::query_as::<_, Variant>(
        "INSERT INTO variants (id, product_id, color, sizes_stock, price, wholesale_price, \
         attributes, is_principal, sku, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(product_id)
    .bind(req.color.as_deref().unwrap_or(DEFAULT_COLOR))
    .bind(sqlx::types::Json(&sizes))
    .bind(req.price)
    .bind(req.wholesale_price)
    .bind(sqlx::types::Json(&req.attributes))
    .bind(req.is_principal)
    .bind(&req.sku)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(variant)
}

pub async fn get_variant(pool: &PgPool, id: Uuid) -> Result<Variant> {
    sqlx::query_as::<_, Variant>("SELECT * FROM variants WHERE id = $1 AND status <> 'deleted'")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("variant"))
}

pub async fn list_variants(pool: &PgPool, product_id: Uuid) -> Result<Vec<Variant>> {
    let variants = sqlx::query_as::<_, Variant>(
        "SELECT * FROM variants WHERE product_id = $1 AND status <> 'deleted' ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(variants)
}

pub async fn update_variant(pool: &PgPool, id: Uuid, req: &NewVariant) -> Result<Variant> {
    let mut tx = pool.begin().await?;
    let current = sqlx::query_as::<_, Variant>(
        "SELECT * FROM variants WHERE id = $1 AND status <> 'deleted' FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(Error::NotFound("variant"))?;
    // An omitted mapping keeps the stored stock; replacement goes through
    // full validation (or bulk_set_stock for stock-only updates).
    let sizes = SizeStock::for_update(&req.sizes_stock, &current.sizes_stock)?;
    if req.is_principal {
        sqlx::query("UPDATE variants SET is_principal = FALSE WHERE product_id = $1 AND id <> $2")
            .bind(current.product_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    let variant = sqlx::query_as::<_, Variant>(
        "UPDATE variants SET color = $2, sizes_stock = $3, price = $4, wholesale_price = $5, \
         attributes = $6, is_principal = $7, sku = $8, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.color.as_deref().unwrap_or(DEFAULT_COLOR))
    .bind(sqlx::types::Json(&sizes))
    .bind(req.price)
    .bind(req.wholesale_price)
    .bind(sqlx::types::Json(&req.attributes))
    .bind(req.is_principal)
    .bind(&req.sku)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(variant)
}

pub async fn soft_delete_variant(pool: &PgPool, id: Uuid) -> Result<()> {
    let updated =
        sqlx::query("UPDATE variants SET status = 'deleted', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::NotFound("variant"));
    }
    Ok(())
}

pub async fn stock_of(pool: &PgPool, variant_id: Uuid, size: &str) -> Result<u32> {
    let (stock,): (i32,) = sqlx::query_as(
        "SELECT COALESCE((sizes_stock->>$2)::int, 0) FROM variants \
         WHERE id = $1 AND status <> 'deleted'",
    )
    .bind(variant_id)
    .bind(size)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("variant"))?;
    Ok(stock.max(0) as u32)
}

/// A ledger quantity must fit the `int` column it is bound against; anything
/// larger would truncate negative on the wire and invert the operation.
fn db_qty(qty: u32) -> Result<i32> {
    i32::try_from(qty)
        .map_err(|_| Error::InvalidRequest(format!("quantity {qty} is out of range")))
}

/// Race-safe decrement: the quantity guard lives in the UPDATE's WHERE clause,
/// so of two concurrent decrements only one can win the remaining stock.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    variant_id: Uuid,
    size: &str,
    qty: u32,
) -> Result<()> {
    let qty_db = db_qty(qty)?;
    let updated = sqlx::query(
        "UPDATE variants SET \
         sizes_stock = jsonb_set(sizes_stock, ARRAY[$2], to_jsonb((sizes_stock->>$2)::int - $3)), \
         updated_at = NOW() \
         WHERE id = $1 AND status <> 'deleted' \
         AND COALESCE((sizes_stock->>$2)::int, 0) >= $3",
    )
    .bind(variant_id)
    .bind(size)
    .bind(qty_db)
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() == 1 {
        return Ok(());
    }
    // Refused: report requested vs available, or surface a missing variant.
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT COALESCE((sizes_stock->>$2)::int, 0) FROM variants \
         WHERE id = $1 AND status <> 'deleted'",
    )
    .bind(variant_id)
    .bind(size)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some((available,)) => Err(Error::InsufficientStock {
            size: size.to_string(),
            requested: qty,
            available: available.max(0) as u32,
        }),
        None => Err(Error::NotFound("variant")),
    }
}

/// Unconditional add; restocks and manual reconciliation only.
pub async fn increment_stock(
    conn: &mut PgConnection,
    variant_id: Uuid,
    size: &str,
    qty: u32,
) -> Result<()> {
    let qty_db = db_qty(qty)?;
    let updated = sqlx::query(
        "UPDATE variants SET \
         sizes_stock = jsonb_set(sizes_stock, ARRAY[$2], \
             to_jsonb(COALESCE((sizes_stock->>$2)::int, 0) + $3)), \
         updated_at = NOW() \
         WHERE id = $1 AND status <> 'deleted'",
    )
    .bind(variant_id)
    .bind(size)
    .bind(qty_db)
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::NotFound("variant"));
    }
    Ok(())
}

/// Full replace of the size→stock mapping. The raw payload is validated as a
/// whole before anything is written; one bad entry rejects the batch.
pub async fn bulk_set_stock(pool: &PgPool, variant_id: Uuid, raw: &Value) -> Result<Variant> {
    let sizes = SizeStock::from_value(raw)?;
    sqlx::query_as::<_, Variant>(
        "UPDATE variants SET sizes_stock = $2, updated_at = NOW() \
         WHERE id = $1 AND status <> 'deleted' RETURNING *",
    )
    .bind(variant_id)
    .bind(sqlx::types::Json(&sizes))
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("variant"))
}

#[cfg(test)]
mod tests {
    use super::db_qty;
    use crate::error::Error;

    #[test]
    fn ledger_quantities_must_fit_the_int_column() {
        assert_eq!(db_qty(0).unwrap(), 0);
        assert_eq!(db_qty(i32::MAX as u32).unwrap(), i32::MAX);
        // 4_294_967_290 would truncate to -6 as an i32 and turn a decrement
        // into an addition; it has to be refused before the bind.
        assert!(matches!(
            db_qty(4_294_967_290u32),
            Err(Error::InvalidRequest(_))
        ));
        assert!(db_qty(i32::MAX as u32 + 1).is_err());
    }
}
