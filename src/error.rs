use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error kinds (spec §7). Only `InvalidInput` and `StoreUnavailable` short-circuit
/// the lookup pipeline; everything else degrades to a soft failure at its tier.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("catalog store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("catalog query error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Self::InvalidInput(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            Self::StoreUnavailable(ref msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.as_str()),
            Self::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            Self::UpstreamError(ref msg) => {
                tracing::warn!("upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.as_str())
            }
            Self::CacheUnavailable(ref msg) => {
                tracing::warn!("persistent cache unavailable: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str())
            }
            Self::Database(ref e) => {
                tracing::error!("database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database error occurred")
            }
            Self::Sqlite(ref e) => {
                tracing::error!("catalog query error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "catalog query error")
            }
            Self::HttpRequest(ref e) => {
                tracing::error!("http request error: {}", e);
                (StatusCode::BAD_GATEWAY, "external service request failed")
            }
            Self::Serialization(ref e) => {
                tracing::error!("serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "data processing error")
            }
            Self::Internal(ref msg) => {
                tracing::error!(breadcrumb = "internal_error", "{}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str())
            }
            Self::Other(ref e) => {
                tracing::error!(breadcrumb = "internal_error", "unexpected error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "an unexpected error occurred")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
