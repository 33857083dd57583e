use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::orchestrator::backoff::BackoffPolicy;
use crate::providers::{brightdata, rapidapi, ProviderId};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Primary fallback chain, tried in order.
    pub provider_order: Vec<ProviderId>,
    pub supplementary_providers: Vec<ProviderId>,
    pub provider_timeout: Duration,
    pub import_deadline: Duration,
    pub backoff: BackoffPolicy,
    pub brightdata_dataset_id: String,
    pub rapidapi_host: String,
    pub scrapingdog_premium: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = BackoffPolicy::default();
        let backoff = BackoffPolicy {
            max_attempts: optional_env("RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_delay: Duration::from_millis(optional_env("RETRY_BASE_DELAY_MS", 500)?),
            multiplier: optional_env("RETRY_MULTIPLIER", defaults.multiplier)?,
            max_delay: Duration::from_millis(optional_env("RETRY_MAX_DELAY_MS", 8000)?),
        };
        if backoff.max_attempts == 0 {
            return Err(anyhow!("RETRY_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            port: optional_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            provider_order: provider_list(
                std::env::var("PROVIDER_ORDER").ok().as_deref(),
                &[ProviderId::BrightData, ProviderId::ScrapingDog],
            )
            .context("PROVIDER_ORDER must be a comma-separated list of providers")?,
            supplementary_providers: provider_list(
                std::env::var("SUPPLEMENTARY_PROVIDERS").ok().as_deref(),
                &[ProviderId::RapidApi],
            )
            .context("SUPPLEMENTARY_PROVIDERS must be a comma-separated list of providers")?,
            provider_timeout: Duration::from_secs(optional_env("PROVIDER_TIMEOUT_SECS", 45)?),
            import_deadline: Duration::from_secs(optional_env("IMPORT_DEADLINE_SECS", 90)?),
            backoff,
            brightdata_dataset_id: std::env::var("BRIGHTDATA_DATASET_ID")
                .unwrap_or_else(|_| brightdata::DEFAULT_DATASET_ID.to_string()),
            rapidapi_host: std::env::var("RAPIDAPI_HOST")
                .unwrap_or_else(|_| rapidapi::DEFAULT_HOST.to_string()),
            scrapingdog_premium: optional_env("SCRAPINGDOG_PREMIUM", false)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

/// Parses `"brightdata, scrapingdog"`. Unset means `default`; an explicitly
/// empty value means no providers. Duplicates are dropped.
fn provider_list(raw: Option<&str>, default: &[ProviderId]) -> Result<Vec<ProviderId>> {
    let Some(raw) = raw else {
        return Ok(default.to_vec());
    };

    let mut providers = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let provider = ProviderId::from_str(name).map_err(|e| anyhow!(e))?;
        if !providers.contains(&provider) {
            providers.push(provider);
        }
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_list_parsing() {
        let default = [ProviderId::BrightData];
        assert_eq!(provider_list(None, &default).unwrap(), default.to_vec());
        assert_eq!(
            provider_list(Some(" ScrapingDog ,brightdata,scrapingdog"), &default).unwrap(),
            vec![ProviderId::ScrapingDog, ProviderId::BrightData]
        );
        assert!(provider_list(Some(""), &default).unwrap().is_empty());
        assert!(provider_list(Some("brightdata,proxycurl"), &default).is_err());
    }

    #[test]
    fn test_optional_env_default_and_error() {
        assert_eq!(
            optional_env::<u64>("IMPORTER_TEST_UNSET_VARIABLE", 45).unwrap(),
            45
        );
        std::env::set_var("IMPORTER_TEST_BAD_PORT", "eighty");
        assert!(optional_env::<u16>("IMPORTER_TEST_BAD_PORT", 8080).is_err());
    }
}
