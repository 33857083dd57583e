use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::profile::CanonicalProfile;
use crate::providers::ProviderId;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("could not serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// What gets handed to the persistence collaborator for one successful import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedProfile {
    pub import_id: Uuid,
    pub user_id: Uuid,
    pub source: ProviderId,
    pub supplemented_by: Vec<ProviderId>,
    pub imported_at: DateTime<Utc>,
    pub profile: CanonicalProfile,
}

#[async_trait]
pub trait ProfileSink: Send + Sync {
    /// Stores the profile and returns where it was put.
    async fn deliver(&self, imported: &ImportedProfile) -> Result<String, SinkError>;
}

/// Writes each import as a JSON object under `imports/{user_id}/{import_id}.json`.
pub struct S3ProfileSink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ProfileSink {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

pub fn object_key(imported: &ImportedProfile) -> String {
    format!("imports/{}/{}.json", imported.user_id, imported.import_id)
}

#[async_trait]
impl ProfileSink for S3ProfileSink {
    async fn deliver(&self, imported: &ImportedProfile) -> Result<String, SinkError> {
        let body = serde_json::to_vec(imported)?;
        let key = object_key(imported);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| SinkError::Upload(e.to_string()))?;

        info!("Uploaded imported profile to s3://{}/{}", self.bucket, key);
        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use super::*;

    /// Keeps delivered profiles in memory; can be told to fail every delivery.
    #[derive(Default)]
    pub struct MemorySink {
        pub delivered: Mutex<Vec<ImportedProfile>>,
        pub fail: bool,
    }

    impl MemorySink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProfileSink for MemorySink {
        async fn deliver(&self, imported: &ImportedProfile) -> Result<String, SinkError> {
            if self.fail {
                return Err(SinkError::Upload("bucket unavailable".to_string()));
            }
            self.delivered.lock().unwrap().push(imported.clone());
            Ok(format!("memory://{}", object_key(imported)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_and_payload_shape() {
        let imported = ImportedProfile {
            import_id: Uuid::nil(),
            user_id: Uuid::nil(),
            source: ProviderId::BrightData,
            supplemented_by: vec![ProviderId::RapidApi],
            imported_at: Utc::now(),
            profile: CanonicalProfile::default(),
        };
        assert_eq!(
            object_key(&imported),
            format!("imports/{}/{}.json", Uuid::nil(), Uuid::nil())
        );

        let json = serde_json::to_value(&imported).unwrap();
        assert_eq!(json["source"], "brightdata");
        assert_eq!(json["supplementedBy"][0], "rapidapi");
        assert_eq!(json["profile"]["skills"], serde_json::json!([]));
    }
}
