use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Everything that reaches the wire from here is unexpected; the
        // surfaces themselves degrade instead of erroring. Log the detail,
        // return a generic body.
        tracing::error!(error = %self, "Request failed");

        let body = Json(json!({
            "error": "internal server error"
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
