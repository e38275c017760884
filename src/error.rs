use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::{error, warn};

use crate::db::CredentialSource;

#[derive(Debug, ThisError)]
pub enum FeedError {
    #[error("missing or invalid API key")]
    AuthFailure,

    #[error("database configuration incomplete (source: {tag})")]
    ConfigIncomplete { tag: CredentialSource },

    #[error("database connection failed (source: {tag}): {error}")]
    ConnectionFailure {
        tag: CredentialSource,
        #[source]
        error: SqlxError,
    },

    #[error("database query failed: {0}")]
    QueryFailure(#[from] SqlxError),

    #[error("invalid table prefix: {0:?}")]
    InvalidTablePrefix(String),

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FeedError {
    /// Status code and the generic message shown to clients.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            FeedError::AuthFailure => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            FeedError::ConfigIncomplete { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database configuration incomplete",
            ),
            FeedError::ConnectionFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Database connection failed")
            }
            FeedError::QueryFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Database query failed")
            }
            FeedError::InvalidTablePrefix(_)
            | FeedError::Config(_)
            | FeedError::Io(_)
            | FeedError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }

    fn log(&self) {
        match self {
            FeedError::AuthFailure => warn!("rejected request: invalid or missing API key"),
            FeedError::ConfigIncomplete { tag } => {
                error!(source = %tag, "database credentials incomplete")
            }
            FeedError::ConnectionFailure { tag, error } => {
                error!(source = %tag, error = %error, "database connection failed")
            }
            other => error!(error = %other, "request failed"),
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> axum::response::Response {
        self.log();
        let (status, message) = self.status_and_message();
        let body = ApiErrorResponse {
            success: false,
            error: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Error body returned to clients; never carries internal details.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: String,
}
