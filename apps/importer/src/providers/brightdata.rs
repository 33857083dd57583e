use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::http::{classify_error_message, classify_transport, embedded_error, read_json};
use super::{ProfileRecord, ProviderAdapter, ProviderError, ProviderId, RawPayload, SourceIdentifier};
use crate::models::credential::Credential;

pub const DEFAULT_BASE_URL: &str = "https://api.brightdata.com/datasets/v3";
pub const DEFAULT_DATASET_ID: &str = "gd_l1viktl72bvl7bjuj0";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_MAX_POLLS: u32 = 12;

/// BrightData dataset API. Collection is asynchronous: a trigger call returns
/// a snapshot id, which is then polled until the scraped record is ready.
///
/// The whole trigger + poll sequence counts as one attempt and is bounded by
/// the orchestrator's per-call timeout.
pub struct BrightDataAdapter {
    client: Client,
    base_url: String,
    dataset_id: String,
    poll_interval: Duration,
    max_polls: u32,
}

enum SnapshotState {
    Pending,
    Ready(Value),
}

impl BrightDataAdapter {
    pub fn new(client: Client, dataset_id: impl Into<String>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL, dataset_id)
    }

    pub fn with_base_url(
        client: Client,
        base_url: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            dataset_id: dataset_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn trigger(&self, profile_url: &str, secret: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/trigger", self.base_url))
            .query(&[("dataset_id", self.dataset_id.as_str())])
            .bearer_auth(secret)
            .json(&json!([{ "url": profile_url }]))
            .send()
            .await
            .map_err(classify_transport)?;

        let body = read_json(response).await?;
        if let Some(message) = embedded_error(&body) {
            return Err(classify_error_message(&message));
        }
        body.get("snapshot_id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                ProviderError::Transient("BrightData trigger returned no snapshot_id".to_string())
            })
    }

    async fn poll_snapshot(&self, snapshot_id: &str, secret: &str) -> Result<SnapshotState, ProviderError> {
        let response = self
            .client
            .get(format!("{}/snapshot/{}", self.base_url, snapshot_id))
            .query(&[("format", "json")])
            .bearer_auth(secret)
            .send()
            .await
            .map_err(classify_transport)?;

        // 202 while collection runs; 404 until the snapshot is materialised.
        if matches!(response.status(), StatusCode::ACCEPTED | StatusCode::NOT_FOUND) {
            return Ok(SnapshotState::Pending);
        }

        let body = read_json(response).await?;
        Ok(snapshot_state(body))
    }
}

fn snapshot_state(body: Value) -> SnapshotState {
    match body {
        Value::Array(items) if items.is_empty() => SnapshotState::Pending,
        Value::Array(items) => SnapshotState::Ready(items.into_iter().next().unwrap_or_default()),
        Value::Object(ref obj)
            if matches!(
                obj.get("status").and_then(Value::as_str),
                Some("running" | "building" | "starting")
            ) =>
        {
            SnapshotState::Pending
        }
        other => SnapshotState::Ready(other),
    }
}

fn into_record(value: Value) -> Result<ProfileRecord, ProviderError> {
    if let Some(message) = embedded_error(&value) {
        return Err(classify_error_message(&message));
    }
    let record = ProfileRecord::from_value(value)
        .ok_or_else(|| ProviderError::NotFound("BrightData snapshot is not a profile".to_string()))?;
    if !record.has_basic_info(ProviderId::BrightData) {
        return Err(ProviderError::NotFound(
            "BrightData profile has no name or headline".to_string(),
        ));
    }
    Ok(record)
}

#[async_trait]
impl ProviderAdapter for BrightDataAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::BrightData
    }

    async fn fetch(
        &self,
        source: &SourceIdentifier,
        credential: &Credential,
    ) -> Result<RawPayload, ProviderError> {
        let snapshot_id = self.trigger(&source.profile_url(), &credential.secret).await?;
        info!("BrightData collection started for '{}' (snapshot {snapshot_id})", source.handle());

        for poll in 0..self.max_polls {
            match self.poll_snapshot(&snapshot_id, &credential.secret).await? {
                SnapshotState::Ready(value) => {
                    debug!("BrightData snapshot {snapshot_id} ready after {} polls", poll + 1);
                    return into_record(value).map(RawPayload::BrightData);
                }
                SnapshotState::Pending => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Err(ProviderError::Transient(format!(
            "BrightData snapshot {snapshot_id} not ready after {} polls",
            self.max_polls
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{credential, spawn_server};
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct FakeBrightData {
        polls: Arc<AtomicU32>,
        ready_after: u32,
    }

    async fn trigger(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if auth != "Bearer good" {
            return (StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"})));
        }
        (StatusCode::OK, Json(json!({"snapshot_id": "s_42"})))
    }

    async fn snapshot(
        State(fake): State<FakeBrightData>,
        Path(id): Path<String>,
    ) -> (StatusCode, Json<Value>) {
        assert_eq!(id, "s_42");
        let seen = fake.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if seen < fake.ready_after {
            return (StatusCode::ACCEPTED, Json(json!({"status": "running"})));
        }
        (
            StatusCode::OK,
            Json(json!([{ "name": "Jane Doe", "headline": "Engineer" }])),
        )
    }

    async fn adapter(ready_after: u32, max_polls: u32) -> (BrightDataAdapter, Arc<AtomicU32>) {
        let polls = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route("/trigger", post(trigger))
            .route("/snapshot/:id", get(snapshot))
            .with_state(FakeBrightData {
                polls: polls.clone(),
                ready_after,
            });
        let base = spawn_server(app).await;
        let adapter = BrightDataAdapter::with_base_url(Client::new(), base, DEFAULT_DATASET_ID)
            .with_polling(Duration::from_millis(5), max_polls);
        (adapter, polls)
    }

    #[tokio::test]
    async fn test_fetch_polls_until_snapshot_ready() {
        let (adapter, polls) = adapter(3, 10).await;
        let source = SourceIdentifier::parse("janedoe").unwrap();
        let payload = adapter
            .fetch(&source, &credential(ProviderId::BrightData, "good", 1, 10))
            .await
            .unwrap();
        assert_eq!(payload.provider(), ProviderId::BrightData);
        assert_eq!(payload.record().fields()["name"], "Jane Doe");
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejected_key_is_invalid_credential() {
        let (adapter, polls) = adapter(1, 10).await;
        let source = SourceIdentifier::parse("janedoe").unwrap();
        let err = adapter
            .fetch(&source, &credential(ProviderId::BrightData, "stolen", 1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredential(_)));
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_snapshot_never_ready_is_transient() {
        let (adapter, polls) = adapter(100, 4).await;
        let source = SourceIdentifier::parse("janedoe").unwrap();
        let err = adapter
            .fetch(&source, &credential(ProviderId::BrightData, "good", 1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transient(_)));
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_snapshot_state_shapes() {
        assert!(matches!(snapshot_state(json!([])), SnapshotState::Pending));
        assert!(matches!(
            snapshot_state(json!({"status": "building"})),
            SnapshotState::Pending
        ));
        assert!(matches!(
            snapshot_state(json!([{"name": "x"}])),
            SnapshotState::Ready(_)
        ));
    }

    #[test]
    fn test_into_record_requires_basic_info() {
        assert!(matches!(
            into_record(json!({"about": "no name here"})),
            Err(ProviderError::NotFound(_))
        ));
        assert!(into_record(json!({"name": "Jane"})).is_ok());
    }

    #[test]
    fn test_into_record_accepts_first_and_last_name() {
        assert!(into_record(json!({"first_name": "Jane", "last_name": "Doe"})).is_ok());
        assert!(into_record(json!({"title": "Staff Engineer"})).is_ok());
    }
}
