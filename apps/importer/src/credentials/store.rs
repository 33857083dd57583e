use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::credential::{Credential, CredentialResult};
use crate::providers::ProviderId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed credential row: {0}")]
    Malformed(String),
}

/// Persistence seam for provider credentials.
///
/// Every mutating method is a single conditional write, so callers never need
/// to hold a lock across a provider call.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn list_for_service(&self, service: ProviderId) -> Result<Vec<Credential>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Credential>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Credential>, StoreError>;

    /// Increments `daily_usage` and `usage_count` only if the credential is
    /// still active and below its daily limit. Returns the updated credential,
    /// or `None` when the condition no longer holds.
    async fn try_reserve(&self, id: Uuid, now: DateTime<Utc>)
        -> Result<Option<Credential>, StoreError>;

    /// Records how a reserved attempt ended. Usage was already counted by `try_reserve`.
    async fn settle(
        &self,
        id: Uuid,
        result: CredentialResult,
        deactivate: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Zeroes `daily_usage` if `last_reset` is before `day_start`. Returns
    /// whether this call performed the reset.
    async fn reset_daily_if_due(
        &self,
        id: Uuid,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Re-enables a deactivated credential. Returns false for an unknown id.
    async fn reactivate(&self, id: Uuid) -> Result<bool, StoreError>;
}
