//! Credential pool: priority-ordered provider keys with per-key daily quotas.
//!
//! Usage is *reserved* with a conditional increment right before a provider
//! call, and the call's outcome is settled afterwards through the returned
//! [`Lease`]. Nothing is locked while the call is in flight.

pub mod handlers;
pub mod health;
pub mod postgres;
pub mod store;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::credential::Credential;
use crate::providers::{OutcomeStatus, ProviderId};

pub use health::{HealthWarning, ServiceUsage};
#[cfg(test)]
pub use store::memory::InMemoryCredentialStore;
pub use store::{CredentialStore, StoreError};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no active {service} credential with remaining daily quota")]
    NoActiveCredentials { service: ProviderId },

    #[error("credential {0} reached its daily limit before it could be reserved")]
    QuotaJustExceeded(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One reserved use of a credential. Usage has already been counted; the
/// lease must be handed back to [`CredentialPool::record_attempt`] once the
/// provider call has finished.
#[must_use = "a lease must be settled with record_attempt"]
#[derive(Debug)]
pub struct Lease {
    credential: Credential,
}

impl Lease {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn id(&self) -> Uuid {
        self.credential.id
    }
}

#[derive(Clone)]
pub struct CredentialPool {
    store: Arc<dyn CredentialStore>,
}

/// Ascending priority, then least recently used (never used first), then id.
fn selection_order(a: &Credential, b: &Credential) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.last_used_at.cmp(&b.last_used_at))
        .then_with(|| a.id.cmp(&b.id))
}

fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

impl CredentialPool {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Best eligible credential for `service`, skipping anything in `exclude`.
    ///
    /// Applies any pending daily reset first, so yesterday's exhausted keys
    /// become selectable again.
    pub async fn select_next(
        &self,
        service: ProviderId,
        exclude: &HashSet<Uuid>,
    ) -> Result<Credential, PoolError> {
        let now = Utc::now();
        let mut candidates = self.store.list_for_service(service).await?;

        for cred in candidates.iter_mut() {
            self.reset_daily_if_due(cred, now).await?;
        }

        candidates
            .into_iter()
            .filter(|c| c.is_eligible() && !exclude.contains(&c.id))
            .min_by(selection_order)
            .ok_or(PoolError::NoActiveCredentials { service })
    }

    /// Takes one unit of `credential`'s daily quota. Fails with
    /// `QuotaJustExceeded` when a concurrent import got there first or the
    /// credential was deactivated meanwhile.
    pub async fn reserve(&self, credential: &Credential) -> Result<Lease, PoolError> {
        match self.store.try_reserve(credential.id, Utc::now()).await? {
            Some(credential) => Ok(Lease { credential }),
            None => Err(PoolError::QuotaJustExceeded(credential.id)),
        }
    }

    /// `select_next` + `reserve`, moving on to the next candidate whenever
    /// the chosen one fills up under contention.
    pub async fn acquire(
        &self,
        service: ProviderId,
        exclude: &HashSet<Uuid>,
    ) -> Result<Lease, PoolError> {
        let mut skip = exclude.clone();
        loop {
            let candidate = self.select_next(service, &skip).await?;
            match self.reserve(&candidate).await {
                Ok(lease) => {
                    debug!(
                        "Reserved {service} credential {} ({}/{} today)",
                        lease.id(),
                        lease.credential.daily_usage,
                        lease.credential.daily_limit
                    );
                    return Ok(lease);
                }
                Err(PoolError::QuotaJustExceeded(id)) => {
                    debug!("{service} credential {id} filled up concurrently; trying next");
                    skip.insert(id);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Settles a reserved attempt. Usage was counted when the lease was taken,
    /// so every attempt is counted exactly once whatever its outcome.
    /// `InvalidCredential` deactivates the key until manually reactivated.
    pub async fn record_attempt(&self, lease: Lease, status: OutcomeStatus) -> Result<(), PoolError> {
        let deactivate = status == OutcomeStatus::InvalidCredential;
        self.store
            .settle(lease.id(), status.credential_result(), deactivate, Utc::now())
            .await?;

        if deactivate {
            warn!(
                "Deactivated {} credential {} ({}) after it was rejected",
                lease.credential.service,
                lease.id(),
                lease.credential.secret_hint()
            );
        }
        Ok(())
    }

    /// Zeroes daily usage once per UTC day. Safe to race: the store only
    /// resets when `last_reset` predates today, and `credential` is refreshed
    /// either way.
    pub async fn reset_daily_if_due(
        &self,
        credential: &mut Credential,
        now: DateTime<Utc>,
    ) -> Result<bool, PoolError> {
        if !credential.reset_due(now) {
            return Ok(false);
        }

        let performed = self
            .store
            .reset_daily_if_due(credential.id, utc_day_start(now), now)
            .await?;
        if performed {
            info!(
                "Reset daily usage for {} credential {}",
                credential.service, credential.id
            );
        }
        if let Some(fresh) = self.store.get(credential.id).await? {
            *credential = fresh;
        }
        Ok(performed)
    }

    pub async fn usage_stats(&self) -> Result<Vec<ServiceUsage>, PoolError> {
        let all = self.store.list_all().await?;
        Ok(health::usage_stats(&all, Utc::now()))
    }

    pub async fn health_warnings(&self) -> Result<Vec<HealthWarning>, PoolError> {
        let all = self.store.list_all().await?;
        Ok(health::health_warnings(&all, Utc::now()))
    }

    /// Manual reactivation after an operator rotated or verified the key.
    pub async fn reactivate(&self, id: Uuid) -> Result<bool, PoolError> {
        let found = self.store.reactivate(id).await?;
        if found {
            info!("Reactivated credential {id}");
        }
        Ok(found)
    }
}
