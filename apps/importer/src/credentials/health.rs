use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::credential::{Credential, CredentialResult};
use crate::providers::ProviderId;

/// Share of the daily limit (in percent) at which a credential is flagged.
const NEAR_LIMIT_PERCENT: i64 = 90;
const RECENT_FAILURE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUsage {
    pub service: ProviderId,
    pub total_credentials: usize,
    pub active_credentials: usize,
    pub daily_usage: i64,
    /// Sum of daily limits over active credentials.
    pub daily_capacity: i64,
    pub lifetime_usage: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    NearLimit,
    RecentFailure,
    Deactivated,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthWarning {
    pub credential_id: Uuid,
    pub service: ProviderId,
    pub secret_hint: String,
    pub kind: WarningKind,
    pub message: String,
}

/// Usage a credential effectively has today; a pending reset counts as zero.
fn effective_daily_usage(cred: &Credential, now: DateTime<Utc>) -> i32 {
    if cred.reset_due(now) {
        0
    } else {
        cred.daily_usage
    }
}

/// Per-service usage totals, in `ProviderId::ALL` order. Services without
/// credentials are omitted.
pub fn usage_stats(credentials: &[Credential], now: DateTime<Utc>) -> Vec<ServiceUsage> {
    ProviderId::ALL
        .into_iter()
        .filter_map(|service| {
            let creds: Vec<&Credential> =
                credentials.iter().filter(|c| c.service == service).collect();
            if creds.is_empty() {
                return None;
            }
            Some(ServiceUsage {
                service,
                total_credentials: creds.len(),
                active_credentials: creds.iter().filter(|c| c.active).count(),
                daily_usage: creds
                    .iter()
                    .map(|c| i64::from(effective_daily_usage(c, now)))
                    .sum(),
                daily_capacity: creds
                    .iter()
                    .filter(|c| c.active)
                    .map(|c| i64::from(c.daily_limit))
                    .sum(),
                lifetime_usage: creds.iter().map(|c| c.usage_count).sum(),
            })
        })
        .collect()
}

pub fn health_warnings(credentials: &[Credential], now: DateTime<Utc>) -> Vec<HealthWarning> {
    let failure_window = Duration::hours(RECENT_FAILURE_WINDOW_HOURS);
    let mut warnings = Vec::new();

    for cred in credentials {
        let warn = |kind: WarningKind, message: String| HealthWarning {
            credential_id: cred.id,
            service: cred.service,
            secret_hint: cred.secret_hint(),
            kind,
            message,
        };

        if !cred.active {
            let since = cred
                .deactivated_at
                .map(|at| format!(" since {}", at.to_rfc3339()))
                .unwrap_or_default();
            warnings.push(warn(
                WarningKind::Deactivated,
                format!("{} key deactivated{since}; reactivate after rotating it", cred.service),
            ));
            continue;
        }

        let usage = i64::from(effective_daily_usage(cred, now));
        let limit = i64::from(cred.daily_limit);
        if limit > 0 && usage * 100 >= limit * NEAR_LIMIT_PERCENT {
            warnings.push(warn(
                WarningKind::NearLimit,
                format!("{} key at {usage}/{limit} of its daily limit", cred.service),
            ));
        }

        let failed = matches!(
            cred.last_result,
            CredentialResult::Error | CredentialResult::RateLimited
        );
        let recent = cred
            .last_used_at
            .is_some_and(|at| now.signed_duration_since(at) <= failure_window);
        if failed && recent {
            warnings.push(warn(
                WarningKind::RecentFailure,
                format!(
                    "{} key last call ended with {}",
                    cred.service,
                    cred.last_result.as_str()
                ),
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::credential;

    #[test]
    fn test_usage_stats_groups_by_service() {
        let now = Utc::now();
        let mut a = credential(ProviderId::BrightData, "a", 1, 10);
        a.daily_usage = 4;
        a.usage_count = 40;
        let mut b = credential(ProviderId::BrightData, "b", 2, 5);
        b.active = false;
        b.usage_count = 2;
        let c = credential(ProviderId::RapidApi, "c", 1, 3);

        let stats = usage_stats(&[a, b, c], now);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].service, ProviderId::BrightData);
        assert_eq!(stats[0].total_credentials, 2);
        assert_eq!(stats[0].active_credentials, 1);
        assert_eq!(stats[0].daily_usage, 4);
        assert_eq!(stats[0].daily_capacity, 10);
        assert_eq!(stats[0].lifetime_usage, 42);
        assert_eq!(stats[1].service, ProviderId::RapidApi);
    }

    #[test]
    fn test_warnings_near_limit_recent_failure_and_deactivated() {
        let now = Utc::now();
        let mut near = credential(ProviderId::ScrapingDog, "near", 1, 10);
        near.daily_usage = 9;
        let mut failing = credential(ProviderId::ScrapingDog, "fail", 2, 10);
        failing.last_result = CredentialResult::RateLimited;
        failing.last_used_at = Some(now - Duration::hours(2));
        let mut stale_failure = credential(ProviderId::ScrapingDog, "old", 3, 10);
        stale_failure.last_result = CredentialResult::Error;
        stale_failure.last_used_at = Some(now - Duration::hours(30));
        let mut dead = credential(ProviderId::BrightData, "dead-key-123", 1, 10);
        dead.active = false;
        dead.daily_usage = 10;

        let warnings = health_warnings(&[near, failing, stale_failure, dead], now);
        let kinds: Vec<WarningKind> = warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::NearLimit,
                WarningKind::RecentFailure,
                WarningKind::Deactivated
            ]
        );
        assert_eq!(warnings[2].secret_hint, "dead…");
    }

    #[test]
    fn test_pending_reset_is_not_near_limit() {
        let now = Utc::now();
        let mut cred = credential(ProviderId::RapidApi, "k", 1, 10);
        cred.daily_usage = 10;
        cred.last_reset = now - Duration::days(2);
        assert!(health_warnings(&[cred.clone()], now).is_empty());
        assert_eq!(usage_stats(&[cred], now)[0].daily_usage, 0);
    }
}
