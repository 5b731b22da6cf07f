//! Gallery handlers: upload, remove, reorder.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{Actor, AppState};
use crate::domain::gallery::VariantImage;
use crate::error::{Error, Result};
use crate::repo;

pub async fn list_images(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
) -> Result<Json<Vec<VariantImage>>> {
    repo::catalog::get_variant(&state.db, variant_id).await?;
    let images = repo::gallery::list(&state.db, variant_id).await?;
    Ok(Json(images))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub order: Option<i32>,
}

/// Accepts the raw image bytes as the request body. The bytes are opaque
/// here; only the key derivation and the cap are this service's business.
pub async fn add_image(
    State(state): State<AppState>,
    actor: Actor,
    Path(variant_id): Path<Uuid>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<VariantImage>)> {
    actor.require_admin()?;
    if body.is_empty() {
        return Err(Error::InvalidRequest("empty image body".to_string()));
    }
    let image =
        repo::gallery::add_image(&state.db, &state.blobs, variant_id, &body, params.order).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn remove_image(
    State(state): State<AppState>,
    actor: Actor,
    Path(image_id): Path<Uuid>,
) -> Result<StatusCode> {
    actor.require_admin()?;
    repo::gallery::remove_image(&state.db, &state.blobs, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub sequence: Vec<Uuid>,
}

pub async fn reorder(
    State(state): State<AppState>,
    actor: Actor,
    Path(variant_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<Vec<VariantImage>>> {
    actor.require_admin()?;
    let images = repo::gallery::reorder(&state.db, variant_id, &req.sequence).await?;
    Ok(Json(images))
}
