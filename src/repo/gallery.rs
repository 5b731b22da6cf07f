//! Gallery persistence: the ≤5 cap enforced under a row lock, blob cleanup,
//! contiguous renumbering.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::gallery::{self, VariantImage, MAX_GALLERY_IMAGES};
use crate::error::{Error, Result};
use crate::storage::BlobStore;

pub async fn list(pool: &PgPool, variant_id: Uuid) -> Result<Vec<VariantImage>> {
    let images = sqlx::query_as::<_, VariantImage>(
        "SELECT * FROM variant_images WHERE variant_id = $1 ORDER BY display_order",
    )
    .bind(variant_id)
    .fetch_all(pool)
    .await?;
    Ok(images)
}

/// Uploads one gallery image. The count-then-insert runs under a lock on the
/// variant row, so two concurrent uploads cannot both pass the cap check.
pub async fn add_image(
    pool: &PgPool,
    store: &BlobStore,
    variant_id: Uuid,
    bytes: &[u8],
    desired_order: Option<i32>,
) -> Result<VariantImage> {
    let mut tx = pool.begin().await?;
    let variant: Option<(Uuid, String)> = sqlx::query_as(
        "SELECT product_id, color FROM variants \
         WHERE id = $1 AND status <> 'deleted' FOR UPDATE",
    )
    .bind(variant_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (product_id, color) = variant.ok_or(Error::NotFound("variant"))?;
    let (product_name,): (String,) = sqlx::query_as("SELECT name FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM variant_images WHERE variant_id = $1")
            .bind(variant_id)
            .fetch_one(&mut *tx)
            .await?;
    if count as usize >= MAX_GALLERY_IMAGES {
        return Err(Error::GalleryFull {
            max: MAX_GALLERY_IMAGES,
        });
    }

    let display_order = match desired_order.filter(|o| *o >= 1) {
        Some(order) => {
            let (in_use,): (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM variant_images \
                 WHERE variant_id = $1 AND display_order = $2)",
            )
            .bind(variant_id)
            .bind(order)
            .fetch_one(&mut *tx)
            .await?;
            if in_use {
                return Err(Error::InvalidRequest(format!(
                    "display order {order} is already in use"
                )));
            }
            order
        }
        None => count as i32 + 1,
    };
    // Keyed by the image's own id: display positions get renumbered after
    // removals, so they cannot identify a blob.
    let image_id = Uuid::now_v7();
    let key = gallery::storage_key_for(
        product_id,
        &product_name,
        &color,
        Some(variant_id),
        image_id,
    );
    store.put(&key, bytes).await?;
    let image = sqlx::query_as::<_, VariantImage>(
        "INSERT INTO variant_images (id, variant_id, storage_key, display_order, created_at) \
         VALUES ($1, $2, $3, $4, NOW()) RETURNING *",
    )
    .bind(image_id)
    .bind(variant_id)
    .bind(&key)
    .bind(display_order)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(image)
}

/// Deletes the backing blob first (best effort), removes the row, and closes
/// the ordering gap left behind.
pub async fn remove_image(pool: &PgPool, store: &BlobStore, image_id: Uuid) -> Result<()> {
    let image = sqlx::query_as::<_, VariantImage>("SELECT * FROM variant_images WHERE id = $1")
        .bind(image_id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("image"))?;

    // Blob first: a stale blob under a reusable key is worse than a dangling
    // row we are about to delete anyway.
    if let Err(e) = store.delete(&image.storage_key).await {
        tracing::warn!(key = %image.storage_key, error = %e, "failed to delete image blob");
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM variant_images WHERE id = $1")
        .bind(image_id)
        .execute(&mut *tx)
        .await?;
    renumber_remaining(&mut tx, image.variant_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Applies an explicit ordering: ids in `sequence` take the front positions,
/// the rest keep their relative order.
pub async fn reorder(pool: &PgPool, variant_id: Uuid, sequence: &[Uuid]) -> Result<Vec<VariantImage>> {
    let mut tx = pool.begin().await?;
    let locked: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM variants WHERE id = $1 AND status <> 'deleted' FOR UPDATE")
            .bind(variant_id)
            .fetch_optional(&mut *tx)
            .await?;
    if locked.is_none() {
        return Err(Error::NotFound("variant"));
    }
    let images = sqlx::query_as::<_, VariantImage>(
        "SELECT * FROM variant_images WHERE variant_id = $1 ORDER BY display_order",
    )
    .bind(variant_id)
    .fetch_all(&mut *tx)
    .await?;
    for (id, display_order) in gallery::reorder(&images, sequence) {
        sqlx::query("UPDATE variant_images SET display_order = $2 WHERE id = $1")
            .bind(id)
            .bind(display_order)
            .execute(&mut *tx)
            .await?;
    }
    let images = sqlx::query_as::<_, VariantImage>(
        "SELECT * FROM variant_images WHERE variant_id = $1 ORDER BY display_order",
    )
    .bind(variant_id)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(images)
}

async fn renumber_remaining(conn: &mut PgConnection, variant_id: Uuid) -> Result<()> {
    let images = sqlx::query_as::<_, VariantImage>(
        "SELECT * FROM variant_images WHERE variant_id = $1 ORDER BY display_order",
    )
    .bind(variant_id)
    .fetch_all(&mut *conn)
    .await?;
    for (id, display_order) in gallery::renumber(&images) {
        sqlx::query("UPDATE variant_images SET display_order = $2 WHERE id = $1")
            .bind(id)
            .bind(display_order)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
