use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::credentials::{HealthWarning, ServiceUsage};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CredentialHealthResponse {
    pub stats: Vec<ServiceUsage>,
    pub warnings: Vec<HealthWarning>,
}

/// GET /api/v1/credentials/health
pub async fn handle_credential_health(
    State(state): State<AppState>,
) -> Result<Json<CredentialHealthResponse>, AppError> {
    let stats = state.credentials.usage_stats().await?;
    let warnings = state.credentials.health_warnings().await?;
    Ok(Json(CredentialHealthResponse { stats, warnings }))
}

/// POST /api/v1/credentials/:id/reactivate
pub async fn handle_reactivate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.credentials.reactivate(id).await? {
        return Err(AppError::NotFound(format!("Credential {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
