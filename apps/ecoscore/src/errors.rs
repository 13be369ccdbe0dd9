use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::eco::PeriodType;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected before anything is written.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Snapshot already recorded for user {user_id} ({period_type} {date})")]
    DuplicateSnapshot {
        user_id: Uuid,
        date: NaiveDate,
        period_type: PeriodType,
    },

    /// Another writer saved this user's score first; re-read and recompute.
    #[error("Concurrent write on eco score of user {user_id} (expected version {expected_version})")]
    ConcurrentWriteConflict { user_id: Uuid, expected_version: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
            }
            AppError::DuplicateSnapshot { .. } => {
                (StatusCode::CONFLICT, "DUPLICATE_SNAPSHOT", self.to_string())
            }
            AppError::ConcurrentWriteConflict { .. } => {
                tracing::warn!("{self}");
                (
                    StatusCode::CONFLICT,
                    "CONCURRENT_WRITE_CONFLICT",
                    "The eco score changed concurrently, retry the request".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Notification(msg) => {
                tracing::error!("Notification error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "NOTIFICATION_ERROR",
                    "A notification error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
