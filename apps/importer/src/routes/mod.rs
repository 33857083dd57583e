pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::credentials::handlers as credentials;
use crate::import::handlers as import;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/import/profile", post(import::handle_import_profile))
        .route(
            "/api/v1/credentials/health",
            get(credentials::handle_credential_health),
        )
        .route(
            "/api/v1/credentials/:id/reactivate",
            post(credentials::handle_reactivate),
        )
        .with_state(state)
}
