use axum::{extract::State, http::StatusCode, Json};

use crate::import::service::{ImportErrorKind, ImportRequest, ImportResult};
use crate::state::AppState;

fn status_for(result: &ImportResult) -> StatusCode {
    match result.error_kind {
        None => StatusCode::OK,
        Some(ImportErrorKind::QuotaExceeded) => StatusCode::TOO_MANY_REQUESTS,
        Some(ImportErrorKind::InvalidSource) => StatusCode::BAD_REQUEST,
        Some(ImportErrorKind::AllProvidersFailed) => StatusCode::BAD_GATEWAY,
        Some(ImportErrorKind::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        Some(ImportErrorKind::HandoffFailed | ImportErrorKind::Internal) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// POST /api/v1/import/profile
/// Failed imports still carry an `ImportResult` body so clients always see
/// `remainingImports` and an actionable message.
pub async fn handle_import_profile(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> (StatusCode, Json<ImportResult>) {
    let result = state.importer.import(req).await;
    (status_for(&result), Json(result))
}
