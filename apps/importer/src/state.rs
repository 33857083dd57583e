use std::sync::Arc;

use crate::credentials::CredentialPool;
use crate::import::service::ImportService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialPool,
    pub importer: Arc<ImportService>,
}
