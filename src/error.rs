//! Service error taxonomy and HTTP status mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("insufficient stock for size {size}: requested {requested}, available {available}")]
    InsufficientStock {
        size: String,
        requested: u32,
        available: u32,
    },

    #[error("invalid stock value for size {size}: {value}")]
    InvalidStockValue {
        size: String,
        value: serde_json::Value,
    },

    #[error("gallery is full: a variant holds at most {max} images")]
    GalleryFull { max: usize },

    #[error("unrecognized order status: {0}")]
    InvalidStatus(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("webhook signature verification failed")]
    SignatureMismatch,

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("access to this resource is denied")]
    Forbidden,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("blob storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Error::InsufficientStock { .. }
            | Error::InvalidStockValue { .. }
            | Error::GalleryFull { .. }
            | Error::InvalidStatus(_)
            | Error::InvalidRequest(_)
            | Error::Gateway(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::SignatureMismatch => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            // Do not leak internals to the caller; the full error goes to the log.
            Error::Database(e) => {
                tracing::error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            Error::Storage(e) => {
                tracing::error!(error = %e, "blob storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
