//! Error taxonomy for the builder backend
//!
//! Webhook-path failures never surface through these types: the dispatcher
//! logs and acknowledges by design. Everything operator-facing maps to an
//! HTTP response here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::codec::DecodeError;
use crate::shopify::MetafieldError;

/// Cache store failure. The Postgres implementation folds `sqlx::Error` in;
/// in-memory fakes construct it directly.
#[derive(Clone, Debug, Error)]
#[error("cache store error: {0}")]
pub struct CacheError(pub String);

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad operator input. Raised before any I/O, so it implies zero side
    /// effects.
    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    External(#[from] MetafieldError),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Cache(_) | Self::External(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let field = match &self {
            Self::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "field": field,
        });
        (status, Json(body)).into_response()
    }
}

/// Collapse validator output into a single field-level error.
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".to_string());
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("input".to_string(), "invalid value".to_string()));
        Self::Validation { field, message }
    }
}
