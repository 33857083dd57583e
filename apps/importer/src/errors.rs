use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::credentials::PoolError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credential pool error: {0}")]
    Pool(#[from] PoolError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Pool(PoolError::NoActiveCredentials { service }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NO_ACTIVE_CREDENTIALS",
                format!("No usable {service} credential is configured"),
            ),
            AppError::Pool(e) => {
                tracing::error!("Credential pool error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CREDENTIAL_STORE_ERROR",
                    "A credential store error occurred".to_string(),
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
