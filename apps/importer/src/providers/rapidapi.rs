use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::http::{classify_error_message, classify_transport, embedded_error, read_json};
use super::{ProfileRecord, ProviderAdapter, ProviderError, ProviderId, RawPayload, SourceIdentifier};
use crate::models::credential::Credential;

pub const DEFAULT_HOST: &str = "fresh-linkedin-profile-data.p.rapidapi.com";

/// LinkedIn profile API published on RapidAPI. Mostly used to supplement
/// skills and certifications that the dataset providers leave out.
pub struct RapidApiAdapter {
    client: Client,
    base_url: String,
    host: String,
}

impl RapidApiAdapter {
    pub fn new(client: Client, host: impl Into<String>) -> Self {
        let host = host.into();
        Self::with_base_url(client, format!("https://{host}"), host)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            host: host.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for RapidApiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::RapidApi
    }

    async fn fetch(
        &self,
        source: &SourceIdentifier,
        credential: &Credential,
    ) -> Result<RawPayload, ProviderError> {
        debug!("RapidAPI lookup via {} for '{}'", self.host, source.handle());

        let profile_url = source.profile_url();
        let response = self
            .client
            .get(format!("{}/get-linkedin-profile", self.base_url))
            .query(&[
                ("linkedin_url", profile_url.as_str()),
                ("include_skills", "true"),
                ("include_certifications", "true"),
            ])
            .header("x-rapidapi-key", &credential.secret)
            .header("x-rapidapi-host", &self.host)
            .send()
            .await
            .map_err(classify_transport)?;

        let body = read_json(response).await?;
        extract_profile(body).map(RawPayload::RapidApi)
    }
}

/// Unwraps the `data` / `profile` envelope some RapidAPI listings use.
fn extract_profile(body: Value) -> Result<ProfileRecord, ProviderError> {
    if let Some(message) = embedded_error(&body) {
        return Err(classify_error_message(&message));
    }

    let inner = match body {
        Value::Object(mut obj) => match obj.remove("data").or_else(|| obj.remove("profile")) {
            Some(inner @ Value::Object(_)) => inner,
            _ => Value::Object(obj),
        },
        other => other,
    };

    let record = ProfileRecord::from_value(inner)
        .ok_or_else(|| ProviderError::NotFound("RapidAPI returned no profile object".to_string()))?;
    if !record.has_basic_info(ProviderId::RapidApi) {
        return Err(ProviderError::NotFound(
            "RapidAPI profile has no name or headline".to_string(),
        ));
    }
    Ok(record)
}
