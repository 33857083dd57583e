//! Provider adapters, one per external profile scraping or enrichment service.
//!
//! Each adapter knows its own request shape (base URL, auth headers, query
//! parameters) and response envelope. The orchestrator only ever sees a
//! [`RawPayload`] on success or a classified [`ProviderError`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::credential::{Credential, CredentialResult};
use crate::normalize::fields::mapping_for;

pub mod brightdata;
pub mod http;
pub mod identifier;
pub mod rapidapi;
pub mod scrapingdog;

pub use identifier::SourceIdentifier;

/// Every provider this service knows how to call. Also the `service` name
/// credentials are provisioned under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderId {
    #[serde(rename = "brightdata")]
    BrightData,
    #[serde(rename = "scrapingdog")]
    ScrapingDog,
    #[serde(rename = "rapidapi")]
    RapidApi,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [
        ProviderId::BrightData,
        ProviderId::ScrapingDog,
        ProviderId::RapidApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::BrightData => "brightdata",
            ProviderId::ScrapingDog => "scrapingdog",
            ProviderId::RapidApi => "rapidapi",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brightdata" => Ok(ProviderId::BrightData),
            "scrapingdog" => Ok(ProviderId::ScrapingDog),
            "rapidapi" => Ok(ProviderId::RapidApi),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Classified adapter failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure, timeout, 5xx or garbled body. Retryable on the same credential.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// 429 or an exhausted provider-side quota. Skip this credential, keep it active.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 401/403. The credential must be deactivated.
    #[error("credential rejected: {0}")]
    InvalidCredential(String),

    /// The provider has no data for this subject. Try another provider.
    #[error("profile not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            ProviderError::Transient(_) => OutcomeStatus::TransientError,
            ProviderError::RateLimited(_) => OutcomeStatus::RateLimited,
            ProviderError::InvalidCredential(_) => OutcomeStatus::InvalidCredential,
            ProviderError::NotFound(_) => OutcomeStatus::NotFound,
        }
    }
}

/// Uniform status of one adapter call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    TransientError,
    RateLimited,
    InvalidCredential,
    NotFound,
}

impl OutcomeStatus {
    /// What the credential's `last_result` becomes after an attempt with this status.
    ///
    /// `NotFound` counts as success for the credential: the provider accepted
    /// and billed the call, it just had no data for the subject.
    pub fn credential_result(&self) -> CredentialResult {
        match self {
            OutcomeStatus::Success | OutcomeStatus::NotFound => CredentialResult::Success,
            OutcomeStatus::TransientError => CredentialResult::Error,
            OutcomeStatus::RateLimited => CredentialResult::RateLimited,
            OutcomeStatus::InvalidCredential => CredentialResult::Invalid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::TransientError => "transient_error",
            OutcomeStatus::RateLimited => "rate_limited",
            OutcomeStatus::InvalidCredential => "invalid_credential",
            OutcomeStatus::NotFound => "not_found",
        }
    }
}

/// Telemetry record of a single adapter call. Lives only for one import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutcome {
    pub provider_id: ProviderId,
    pub credential_id: Uuid,
    pub status: OutcomeStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A single profile object as returned by a provider, envelope already removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProfileRecord(Map<String, Value>);

impl ProfileRecord {
    /// Accepts a JSON object; anything else is not a profile.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// True when the record carries a name (full, or first/last parts) or a
    /// headline under any of the keys the normalizer reads for `provider`.
    pub fn has_basic_info(&self, provider: ProviderId) -> bool {
        let keys = &mapping_for(provider).personal;
        keys.full_name
            .iter()
            .chain(keys.title)
            .any(|k| self.has_text(k))
            || keys
                .name_parts
                .iter()
                .any(|(first, last)| self.has_text(first) || self.has_text(last))
    }

    /// Looks `key` up, descending into nested objects on `.`.
    fn has_text(&self, key: &str) -> bool {
        let mut parts = key.split('.');
        let mut current = parts.next().and_then(|head| self.0.get(head));
        for part in parts {
            current = current.and_then(|v| v.get(part));
        }
        match current {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }
}

/// Closed set of provider response shapes the normalizer understands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "provider", content = "record", rename_all = "lowercase")]
pub enum RawPayload {
    BrightData(ProfileRecord),
    ScrapingDog(ProfileRecord),
    RapidApi(ProfileRecord),
}

impl RawPayload {
    pub fn provider(&self) -> ProviderId {
        match self {
            RawPayload::BrightData(_) => ProviderId::BrightData,
            RawPayload::ScrapingDog(_) => ProviderId::ScrapingDog,
            RawPayload::RapidApi(_) => ProviderId::RapidApi,
        }
    }

    pub fn record(&self) -> &ProfileRecord {
        match self {
            RawPayload::BrightData(r) | RawPayload::ScrapingDog(r) | RawPayload::RapidApi(r) => r,
        }
    }
}

/// The adapter contract. Implement this to add a provider without touching
/// the orchestrator or the import service.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn fetch(
        &self,
        source: &SourceIdentifier,
        credential: &Credential,
    ) -> Result<RawPayload, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_id_round_trips_through_str() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
        }
        assert!("linkedin".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_not_found_keeps_credential_healthy() {
        assert_eq!(
            OutcomeStatus::NotFound.credential_result(),
            CredentialResult::Success
        );
        assert_eq!(
            OutcomeStatus::InvalidCredential.credential_result(),
            CredentialResult::Invalid
        );
    }

    #[test]
    fn test_basic_info_detection() {
        let with_name = ProfileRecord::from_value(json!({"name": "Jane Doe"})).unwrap();
        let blank = ProfileRecord::from_value(json!({"name": "  ", "about": "x"})).unwrap();
        assert!(with_name.has_basic_info(ProviderId::BrightData));
        assert!(!blank.has_basic_info(ProviderId::BrightData));
        assert!(ProfileRecord::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_basic_info_follows_provider_name_keys() {
        let parts = ProfileRecord::from_value(json!({"first_name": "Jane", "last_name": "Doe"})).unwrap();
        assert!(parts.has_basic_info(ProviderId::RapidApi));
        assert!(parts.has_basic_info(ProviderId::BrightData));

        let job_title = ProfileRecord::from_value(json!({"job_title": "Engineer"})).unwrap();
        assert!(job_title.has_basic_info(ProviderId::RapidApi));
        assert!(!job_title.has_basic_info(ProviderId::ScrapingDog));

        let camel = ProfileRecord::from_value(json!({"firstName": "Jane"})).unwrap();
        assert!(camel.has_basic_info(ProviderId::RapidApi));
    }

    #[test]
    fn test_payload_serializes_with_provider_tag() {
        let payload = RawPayload::ScrapingDog(
            ProfileRecord::from_value(json!({"fullName": "Jane"})).unwrap(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["provider"], "scrapingdog");
        assert_eq!(json["record"]["fullName"], "Jane");
    }
}
