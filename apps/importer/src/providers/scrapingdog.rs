use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::http::{classify_error_message, classify_transport, embedded_error, read_json};
use super::{ProfileRecord, ProviderAdapter, ProviderError, ProviderId, RawPayload, SourceIdentifier};
use crate::models::credential::Credential;

pub const DEFAULT_BASE_URL: &str = "https://api.scrapingdog.com/linkedin";

/// ScrapingDog LinkedIn profile API. Keyed by `api_key` query parameter,
/// looks profiles up by handle and answers with a one-element array.
pub struct ScrapingDogAdapter {
    client: Client,
    base_url: String,
    premium: bool,
}

impl ScrapingDogAdapter {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            premium: false,
        }
    }

    /// Premium lookups cost more credits but bypass ScrapingDog's cache.
    pub fn with_premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }
}

#[async_trait]
impl ProviderAdapter for ScrapingDogAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::ScrapingDog
    }

    async fn fetch(
        &self,
        source: &SourceIdentifier,
        credential: &Credential,
    ) -> Result<RawPayload, ProviderError> {
        debug!("ScrapingDog lookup for '{}'", source.handle());

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("api_key", credential.secret.as_str()),
                ("type", "profile"),
                ("linkId", source.handle()),
                ("premium", if self.premium { "true" } else { "false" }),
            ])
            .send()
            .await
            .map_err(classify_transport)?;

        let body = read_json(response).await?;
        extract_profile(body).map(RawPayload::ScrapingDog)
    }
}

fn extract_profile(body: Value) -> Result<ProfileRecord, ProviderError> {
    if let Some(message) = embedded_error(&body) {
        return Err(classify_error_message(&message));
    }

    let first = match body {
        Value::Array(items) => items.into_iter().next(),
        other => Some(other),
    };

    let record = first
        .and_then(ProfileRecord::from_value)
        .ok_or_else(|| ProviderError::NotFound("ScrapingDog returned no profile".to_string()))?;

    if !record.has_basic_info(ProviderId::ScrapingDog) {
        return Err(ProviderError::NotFound(
            "ScrapingDog profile has no name or headline".to_string(),
        ));
    }
    Ok(record)
}
