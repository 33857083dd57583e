//! Provider fallback loop.
//!
//! For each provider in business order: lease the best credential, call the
//! adapter, and decide from the classified outcome whether to retry the same
//! credential, move to the next credential, or move to the next provider.

pub mod backoff;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialPool, Lease, PoolError};
use crate::models::credential::Credential;
use crate::providers::{
    OutcomeStatus, ProviderAdapter, ProviderId, ProviderOutcome, RawPayload, SourceIdentifier,
};

pub use backoff::BackoffPolicy;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("all providers failed ({} attempts)", attempts.len())]
    AllProvidersFailed { attempts: Vec<ProviderOutcome> },

    #[error("import deadline exceeded ({} attempts)", attempts.len())]
    Timeout { attempts: Vec<ProviderOutcome> },

    #[error("credential pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Successful orchestration: the payload, who produced it, and every attempt made.
#[derive(Debug)]
pub struct Fetched {
    pub provider: ProviderId,
    pub payload: RawPayload,
    pub attempts: Vec<ProviderOutcome>,
}

enum Next {
    Done(RawPayload),
    RetrySameCredential,
    NextCredential,
    NextProvider,
    DeadlineExceeded,
}

pub struct FallbackOrchestrator {
    pool: CredentialPool,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    backoff: BackoffPolicy,
    call_timeout: Duration,
}

impl FallbackOrchestrator {
    /// `adapters` is the fallback chain, tried in the given order.
    pub fn new(pool: CredentialPool, adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            pool,
            adapters,
            backoff: BackoffPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    pub async fn run(
        &self,
        source: &SourceIdentifier,
        deadline: Instant,
    ) -> Result<Fetched, OrchestrationError> {
        self.run_with(&self.adapters, source, deadline).await
    }

    /// Runs the fallback loop over an explicit provider list instead of the
    /// configured chain.
    pub async fn run_with(
        &self,
        adapters: &[Arc<dyn ProviderAdapter>],
        source: &SourceIdentifier,
        deadline: Instant,
    ) -> Result<Fetched, OrchestrationError> {
        let mut attempts: Vec<ProviderOutcome> = Vec::new();

        for adapter in adapters {
            let provider = adapter.id();
            let mut given_up: HashSet<uuid::Uuid> = HashSet::new();

            'credentials: loop {
                if Instant::now() >= deadline {
                    return Err(OrchestrationError::Timeout { attempts });
                }

                let mut lease = match self.pool.acquire(provider, &given_up).await {
                    Ok(lease) => lease,
                    Err(PoolError::NoActiveCredentials { .. }) => {
                        info!("No usable {provider} credential left, falling back to next provider");
                        break 'credentials;
                    }
                    Err(e) => return Err(e.into()),
                };
                let credential = lease.credential().clone();
                given_up.insert(credential.id);
                let mut calls_made = 0u32;

                loop {
                    calls_made += 1;
                    let next = self
                        .call_once(adapter.as_ref(), source, lease, deadline, &mut attempts)
                        .await?;

                    match next {
                        Next::Done(payload) => {
                            info!(
                                "Fetched '{}' from {provider} after {} attempt(s)",
                                source.handle(),
                                attempts.len()
                            );
                            return Ok(Fetched {
                                provider,
                                payload,
                                attempts,
                            });
                        }
                        Next::DeadlineExceeded => {
                            warn!("Import deadline hit while calling {provider}");
                            return Err(OrchestrationError::Timeout { attempts });
                        }
                        Next::NextProvider => break 'credentials,
                        Next::NextCredential => continue 'credentials,
                        Next::RetrySameCredential if self.backoff.can_retry(calls_made) => {
                            let delay = self.backoff.delay_for(calls_made - 1);
                            if Instant::now() + delay >= deadline {
                                return Err(OrchestrationError::Timeout { attempts });
                            }
                            warn!(
                                "{provider} call {calls_made}/{} failed transiently, retrying in {}ms",
                                self.backoff.max_attempts,
                                delay.as_millis()
                            );
                            tokio::time::sleep(delay).await;

                            lease = match self.reserve_again(&credential).await? {
                                Some(lease) => lease,
                                None => continue 'credentials,
                            };
                        }
                        Next::RetrySameCredential => {
                            debug!(
                                "{provider} credential {} exhausted its retries",
                                credential.id
                            );
                            continue 'credentials;
                        }
                    }
                }
            }
        }

        warn!(
            "All providers failed for '{}' after {} attempt(s)",
            source.handle(),
            attempts.len()
        );
        Err(OrchestrationError::AllProvidersFailed { attempts })
    }

    /// Makes one adapter call under the per-call timeout, records it exactly
    /// once, and maps the outcome to the next state.
    async fn call_once(
        &self,
        adapter: &dyn ProviderAdapter,
        source: &SourceIdentifier,
        lease: Lease,
        deadline: Instant,
        attempts: &mut Vec<ProviderOutcome>,
    ) -> Result<Next, OrchestrationError> {
        let started = Instant::now();
        let call_deadline = (started + self.call_timeout).min(deadline);
        let result =
            tokio::time::timeout_at(call_deadline, adapter.fetch(source, lease.credential())).await;

        let (status, payload, detail) = match result {
            Ok(Ok(payload)) => (OutcomeStatus::Success, Some(payload), None),
            Ok(Err(e)) => (e.status(), None, Some(e.to_string())),
            Err(_) => (
                OutcomeStatus::TransientError,
                None,
                Some(format!(
                    "no response within {}ms",
                    call_deadline.saturating_duration_since(started).as_millis()
                )),
            ),
        };

        let outcome = ProviderOutcome {
            provider_id: adapter.id(),
            credential_id: lease.id(),
            status,
            latency_ms: started.elapsed().as_millis() as u64,
            detail,
        };
        debug!(
            "{} attempt with credential {} ended {} in {}ms",
            outcome.provider_id,
            outcome.credential_id,
            status.as_str(),
            outcome.latency_ms
        );
        self.pool.record_attempt(lease, status).await?;
        attempts.push(outcome);

        let next = match (status, payload) {
            (OutcomeStatus::Success, Some(payload)) => return Ok(Next::Done(payload)),
            _ if Instant::now() >= deadline => Next::DeadlineExceeded,
            (OutcomeStatus::TransientError, _) => Next::RetrySameCredential,
            (OutcomeStatus::RateLimited | OutcomeStatus::InvalidCredential, _) => {
                Next::NextCredential
            }
            (OutcomeStatus::NotFound, _) => Next::NextProvider,
            (OutcomeStatus::Success, None) => Next::NextCredential,
        };
        Ok(next)
    }

    async fn reserve_again(&self, credential: &Credential) -> Result<Option<Lease>, PoolError> {
        match self.pool.reserve(credential).await {
            Ok(lease) => Ok(Some(lease)),
            Err(PoolError::QuotaJustExceeded(id)) => {
                debug!("Credential {id} has no quota left for a retry");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
