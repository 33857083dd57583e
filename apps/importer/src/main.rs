mod config;
mod credentials;
mod db;
mod errors;
mod import;
mod models;
mod normalize;
mod orchestrator;
mod providers;
mod routes;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::credentials::postgres::PgCredentialStore;
use crate::credentials::CredentialPool;
use crate::db::create_pool;
use crate::import::quota::RedisUsageLedger;
use crate::import::service::{ImportService, SupplementaryProvider};
use crate::import::sink::S3ProfileSink;
use crate::orchestrator::FallbackOrchestrator;
use crate::providers::brightdata::BrightDataAdapter;
use crate::providers::http::build_client;
use crate::providers::rapidapi::RapidApiAdapter;
use crate::providers::scrapingdog::ScrapingDogAdapter;
use crate::providers::{ProviderAdapter, ProviderId};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting profile importer v{}", env!("CARGO_PKG_VERSION"));

    // Credential pool on PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let credentials = CredentialPool::new(Arc::new(PgCredentialStore::new(db)));

    // Per-user daily import ledger on Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let ledger = Arc::new(RedisUsageLedger::new(redis));
    info!("Redis client initialized");

    // Profile hand-off on S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let sink = Arc::new(S3ProfileSink::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    let http = build_client(config.provider_timeout)?;
    let adapter_for = |provider: ProviderId| -> Arc<dyn ProviderAdapter> {
        match provider {
            ProviderId::BrightData => Arc::new(BrightDataAdapter::new(
                http.clone(),
                config.brightdata_dataset_id.clone(),
            )),
            ProviderId::ScrapingDog => Arc::new(
                ScrapingDogAdapter::new(http.clone()).with_premium(config.scrapingdog_premium),
            ),
            ProviderId::RapidApi => Arc::new(RapidApiAdapter::new(
                http.clone(),
                config.rapidapi_host.clone(),
            )),
        }
    };

    let chain: Vec<Arc<dyn ProviderAdapter>> =
        config.provider_order.iter().copied().map(&adapter_for).collect();
    let supplementary: Vec<SupplementaryProvider> = config
        .supplementary_providers
        .iter()
        .copied()
        .map(|p| SupplementaryProvider::new(adapter_for(p)))
        .collect();

    let orchestrator = FallbackOrchestrator::new(credentials.clone(), chain)
        .with_backoff(config.backoff)
        .with_call_timeout(config.provider_timeout);
    info!(
        "Provider chain: {:?}, supplementary: {:?}",
        orchestrator.providers(),
        config.supplementary_providers
    );

    let importer = ImportService::new(Arc::new(orchestrator), ledger, sink)
        .with_supplementary(supplementary)
        .with_deadline(config.import_deadline);

    let state = AppState {
        credentials,
        importer: Arc::new(importer),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "importer-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
