use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::providers::ProviderId;

/// Result of the last attempt made with a credential.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialResult {
    Success,
    RateLimited,
    Invalid,
    Error,
    Unknown,
}

impl CredentialResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialResult::Success => "success",
            CredentialResult::RateLimited => "rate_limited",
            CredentialResult::Invalid => "invalid",
            CredentialResult::Error => "error",
            CredentialResult::Unknown => "unknown",
        }
    }

    /// Unrecognised values (legacy rows, manual edits) read as `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "success" => CredentialResult::Success,
            "rate_limited" => CredentialResult::RateLimited,
            "invalid" => CredentialResult::Invalid,
            "error" => CredentialResult::Error,
            _ => CredentialResult::Unknown,
        }
    }
}

/// One provider API key with its priority and quota state.
///
/// `priority` is ascending: 1 is tried before 2.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Uuid,
    pub service: ProviderId,
    #[serde(skip_serializing)]
    pub secret: String,
    pub active: bool,
    pub priority: i32,
    pub daily_limit: i32,
    pub daily_usage: i32,
    pub usage_count: i64,
    pub last_reset: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_result: CredentialResult,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// A fresh, active credential as provisioning would create it.
    #[cfg(test)]
    pub fn new(
        service: ProviderId,
        secret: impl Into<String>,
        priority: i32,
        daily_limit: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service,
            secret: secret.into(),
            active: true,
            priority,
            daily_limit: daily_limit.max(0),
            daily_usage: 0,
            usage_count: 0,
            last_reset: now,
            last_used_at: None,
            last_result: CredentialResult::Unknown,
            deactivated_at: None,
        }
    }

    pub fn has_quota(&self) -> bool {
        self.daily_usage < self.daily_limit
    }

    pub fn is_eligible(&self) -> bool {
        self.active && self.has_quota()
    }

    /// True when `last_reset` falls on an earlier UTC day than `now`.
    pub fn reset_due(&self, now: DateTime<Utc>) -> bool {
        self.last_reset.date_naive() < now.date_naive()
    }

    /// First few characters of the secret, safe for logs and admin output.
    pub fn secret_hint(&self) -> String {
        let prefix: String = self.secret.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("secret", &self.secret_hint())
            .field("active", &self.active)
            .field("priority", &self.priority)
            .field("daily_limit", &self.daily_limit)
            .field("daily_usage", &self.daily_usage)
            .field("usage_count", &self.usage_count)
            .field("last_reset", &self.last_reset)
            .field("last_used_at", &self.last_used_at)
            .field("last_result", &self.last_result)
            .field("deactivated_at", &self.deactivated_at)
            .finish()
    }
}

/// Row shape of the `api_credentials` table.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    pub id: Uuid,
    pub service: String,
    pub secret: String,
    pub active: bool,
    pub priority: i32,
    pub daily_limit: i32,
    pub daily_usage: i32,
    pub usage_count: i64,
    pub last_reset: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_result: String,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = String;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let service = row
            .service
            .parse::<ProviderId>()
            .map_err(|e| format!("credential {}: {e}", row.id))?;
        Ok(Credential {
            id: row.id,
            service,
            secret: row.secret,
            active: row.active,
            priority: row.priority,
            daily_limit: row.daily_limit,
            daily_usage: row.daily_usage,
            usage_count: row.usage_count,
            last_reset: row.last_reset,
            last_used_at: row.last_used_at,
            last_result: CredentialResult::parse(&row.last_result),
            deactivated_at: row.deactivated_at,
        })
    }
}
