//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use serde_json::Value;

use crate::models::credential::Credential;
use crate::providers::{
    ProfileRecord, ProviderAdapter, ProviderError, ProviderId, RawPayload, SourceIdentifier,
};

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn credential(service: ProviderId, secret: &str, priority: i32, daily_limit: i32) -> Credential {
    Credential::new(service, secret, priority, daily_limit, Utc::now())
}

pub fn payload(provider: ProviderId, value: Value) -> RawPayload {
    let record = ProfileRecord::from_value(value).unwrap();
    match provider {
        ProviderId::BrightData => RawPayload::BrightData(record),
        ProviderId::ScrapingDog => RawPayload::ScrapingDog(record),
        ProviderId::RapidApi => RawPayload::RapidApi(record),
    }
}

/// Adapter that replays a fixed script of results, one per call. Once the
/// script runs out every further call repeats `fallback`.
pub struct ScriptedAdapter {
    id: ProviderId,
    script: Mutex<VecDeque<Result<RawPayload, ProviderError>>>,
    fallback: Result<RawPayload, ProviderError>,
    calls: AtomicU32,
    secrets_seen: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    pub fn new(id: ProviderId, fallback: Result<RawPayload, ProviderError>) -> Self {
        Self {
            id,
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicU32::new(0),
            secrets_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok(id: ProviderId, value: Value) -> Arc<Self> {
        Arc::new(Self::new(id, Ok(payload(id, value))))
    }

    pub fn always_err(id: ProviderId, err: ProviderError) -> Arc<Self> {
        Arc::new(Self::new(id, Err(err)))
    }

    pub fn then(self, result: Result<RawPayload, ProviderError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Secrets of the credentials this adapter was called with, in call order.
    pub fn secrets_seen(&self) -> Vec<String> {
        self.secrets_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn fetch(
        &self,
        _source: &SourceIdentifier,
        credential: &Credential,
    ) -> Result<RawPayload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.secrets_seen
            .lock()
            .unwrap()
            .push(credential.secret.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
