use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::quota::{LedgerError, UsageLedger};
use super::sink::{ImportedProfile, ProfileSink};
use crate::models::profile::{CanonicalProfile, Section};
use crate::models::user::Tier;
use crate::normalize::{merge_supplementary, normalize, NormalizationWarning};
use crate::orchestrator::{FallbackOrchestrator, OrchestrationError};
use crate::providers::{OutcomeStatus, ProviderAdapter, ProviderId, SourceIdentifier};

pub const DEFAULT_IMPORT_DEADLINE: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub user_id: Uuid,
    pub tier: Tier,
    /// Profile URL or bare handle.
    pub source: String,
    /// Always stamped by the server; decides which day's quota is charged.
    #[serde(skip_deserializing, default = "Utc::now")]
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportErrorKind {
    QuotaExceeded,
    InvalidSource,
    AllProvidersFailed,
    Timeout,
    HandoffFailed,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CanonicalProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ImportErrorKind>,
    /// Imports left today; `-1` for unlimited tiers.
    pub remaining_imports: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
    pub supplemented_by: Vec<ProviderId>,
    pub warnings: Vec<NormalizationWarning>,
}

impl ImportResult {
    fn failed(kind: ImportErrorKind, remaining_imports: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            profile: None,
            error_kind: Some(kind),
            remaining_imports,
            message: Some(message.into()),
            source: None,
            supplemented_by: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// A provider consulted only after a successful primary fetch, and only when
/// the profile is missing one of `sections`.
#[derive(Clone)]
pub struct SupplementaryProvider {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub sections: Vec<Section>,
}

impl SupplementaryProvider {
    pub fn new(adapter: Arc<dyn ProviderAdapter>) -> Self {
        let sections = default_sections(adapter.id());
        Self { adapter, sections }
    }
}

/// Sections each provider is known to fill well enough to be worth a call.
pub fn default_sections(provider: ProviderId) -> Vec<Section> {
    match provider {
        ProviderId::RapidApi => vec![
            Section::Skills,
            Section::Certifications,
            Section::Languages,
            Section::Projects,
        ],
        ProviderId::BrightData | ProviderId::ScrapingDog => vec![
            Section::Experience,
            Section::Education,
            Section::Certifications,
            Section::Languages,
            Section::VolunteerExperience,
        ],
    }
}

fn remaining(limit: Option<u32>, used: u32) -> i32 {
    match limit {
        None => -1,
        Some(limit) => i32::try_from(limit.saturating_sub(used)).unwrap_or(i32::MAX),
    }
}

pub struct ImportService {
    orchestrator: Arc<FallbackOrchestrator>,
    supplementary: Vec<SupplementaryProvider>,
    ledger: Arc<dyn UsageLedger>,
    sink: Arc<dyn ProfileSink>,
    deadline: Duration,
}

impl ImportService {
    pub fn new(
        orchestrator: Arc<FallbackOrchestrator>,
        ledger: Arc<dyn UsageLedger>,
        sink: Arc<dyn ProfileSink>,
    ) -> Self {
        Self {
            orchestrator,
            supplementary: Vec::new(),
            ledger,
            sink,
            deadline: DEFAULT_IMPORT_DEADLINE,
        }
    }

    pub fn with_supplementary(mut self, supplementary: Vec<SupplementaryProvider>) -> Self {
        self.supplementary = supplementary;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn import(&self, request: ImportRequest) -> ImportResult {
        let ImportRequest {
            user_id,
            tier,
            source,
            requested_at,
        } = request;
        let day = requested_at.date_naive();
        let limit = tier.daily_import_limit();

        let source = match SourceIdentifier::parse(&source) {
            Ok(source) => source,
            Err(e) => {
                let used = match self.ledger.used_on(user_id, day).await {
                    Ok(used) => used,
                    Err(ledger_error) => return self.internal(ledger_error),
                };
                return ImportResult::failed(
                    ImportErrorKind::InvalidSource,
                    remaining(limit, used),
                    format!("{e}. Use a profile URL like https://www.linkedin.com/in/<handle> or the bare handle."),
                );
            }
        };

        // Claim before fetching so concurrent imports cannot overshoot the tier limit.
        let used_after_claim = match limit {
            None => 0,
            Some(limit) => match self.ledger.try_claim(user_id, day, limit).await {
                Ok(Some(used)) => used,
                Ok(None) => {
                    info!("User {user_id} reached the {tier} limit of {limit} imports for {day}");
                    return ImportResult::failed(
                        ImportErrorKind::QuotaExceeded,
                        0,
                        format!(
                            "Daily import limit of {limit} reached for the {tier} plan. Try again tomorrow or upgrade your plan."
                        ),
                    );
                }
                Err(e) => return self.internal(e),
            },
        };

        let result = self.run_import(user_id, &source, limit, used_after_claim).await;
        if !result.success && limit.is_some() {
            self.release(user_id, day).await;
        }
        result
    }

    async fn run_import(
        &self,
        user_id: Uuid,
        source: &SourceIdentifier,
        limit: Option<u32>,
        used_after_claim: u32,
    ) -> ImportResult {
        // A failed import gives its slot back.
        let remaining_if_failed = remaining(limit, used_after_claim.saturating_sub(1));
        let deadline = Instant::now() + self.deadline;

        let fetched = match self.orchestrator.run(source, deadline).await {
            Ok(fetched) => fetched,
            Err(OrchestrationError::AllProvidersFailed { attempts }) => {
                warn!(
                    "Import of '{}' for user {user_id} failed after {} attempts",
                    source.handle(),
                    attempts.len()
                );
                return ImportResult::failed(
                    ImportErrorKind::AllProvidersFailed,
                    remaining_if_failed,
                    "No provider could return this profile. Check that the profile is public and try again later; this attempt did not count against your quota.",
                );
            }
            Err(OrchestrationError::Timeout { attempts }) => {
                warn!(
                    "Import of '{}' for user {user_id} timed out after {} attempts",
                    source.handle(),
                    attempts.len()
                );
                return ImportResult::failed(
                    ImportErrorKind::Timeout,
                    remaining_if_failed,
                    "The profile providers did not answer in time. Please try again in a few minutes.",
                );
            }
            Err(OrchestrationError::Pool(e)) => {
                error!("Credential pool failure during import: {e}");
                return ImportResult::failed(
                    ImportErrorKind::Internal,
                    remaining_if_failed,
                    "The import service is temporarily unavailable.",
                );
            }
        };

        let normalized = normalize(&fetched.payload);
        let mut profile = normalized.profile;
        let mut warnings = normalized.warnings;
        let supplemented_by = self
            .supplement(source, deadline, &mut profile, &mut warnings)
            .await;

        let imported = ImportedProfile {
            import_id: Uuid::new_v4(),
            user_id,
            source: fetched.provider,
            supplemented_by: supplemented_by.clone(),
            imported_at: Utc::now(),
            profile,
        };
        if let Err(e) = self.sink.deliver(&imported).await {
            error!("Hand-off of import {} failed: {e}", imported.import_id);
            return ImportResult::failed(
                ImportErrorKind::HandoffFailed,
                remaining_if_failed,
                "The profile was fetched but could not be saved. Please try again; this attempt did not count against your quota.",
            );
        }

        for attempt in fetched.attempts.iter().filter(|a| a.status != OutcomeStatus::Success) {
            info!(
                "Import of '{}' fell through {} credential {} ({}, {}ms): {}",
                source.handle(),
                attempt.provider_id,
                attempt.credential_id,
                attempt.status.as_str(),
                attempt.latency_ms,
                attempt.detail.as_deref().unwrap_or("-")
            );
        }
        info!(
            "Imported '{}' for user {user_id} from {} after {} attempts ({} warnings)",
            source.handle(),
            fetched.provider,
            fetched.attempts.len(),
            warnings.len()
        );
        ImportResult {
            success: true,
            profile: Some(imported.profile),
            error_kind: None,
            remaining_imports: remaining(limit, used_after_claim),
            message: None,
            source: Some(fetched.provider),
            supplemented_by,
            warnings,
        }
    }

    /// Calls each supplementary provider that can fill a gap in `profile`.
    /// Failures only add a warning.
    async fn supplement(
        &self,
        source: &SourceIdentifier,
        deadline: Instant,
        profile: &mut CanonicalProfile,
        warnings: &mut Vec<NormalizationWarning>,
    ) -> Vec<ProviderId> {
        let mut used = Vec::new();

        for supplementary in &self.supplementary {
            let provider = supplementary.adapter.id();
            let gaps = profile.empty_sections();
            if !supplementary.sections.iter().any(|s| gaps.contains(s)) {
                continue;
            }
            if Instant::now() >= deadline {
                warnings.push(NormalizationWarning {
                    field: format!("supplementary.{provider}"),
                    reason: "skipped, import deadline reached".to_string(),
                });
                break;
            }

            let adapters = [supplementary.adapter.clone()];
            match self.orchestrator.run_with(&adapters, source, deadline).await {
                Ok(fetched) => {
                    let extra = normalize(&fetched.payload);
                    let merged = merge_supplementary(profile.clone(), &extra.profile);
                    if merged != *profile {
                        *profile = merged;
                        used.push(provider);
                        warnings.extend(extra.warnings);
                    }
                }
                Err(e) => {
                    warn!("Supplementary provider {provider} failed: {e}");
                    warnings.push(NormalizationWarning {
                        field: format!("supplementary.{provider}"),
                        reason: e.to_string(),
                    });
                }
            }
        }

        used
    }

    async fn release(&self, user_id: Uuid, day: chrono::NaiveDate) {
        if let Err(e) = self.ledger.release(user_id, day).await {
            warn!("Could not release import slot for user {user_id}: {e}");
        }
    }

    fn internal(&self, e: LedgerError) -> ImportResult {
        error!("Usage ledger failure: {e}");
        ImportResult::failed(
            ImportErrorKind::Internal,
            0,
            "The import service is temporarily unavailable.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialPool, InMemoryCredentialStore};
    use crate::import::quota::memory::InMemoryUsageLedger;
    use crate::import::sink::memory::MemorySink;
    use crate::providers::ProviderError;
    use crate::test_support::{credential, ScriptedAdapter};
    use serde_json::json;

    struct Fixture {
        service: ImportService,
        ledger: Arc<InMemoryUsageLedger>,
        sink: Arc<MemorySink>,
    }

    fn fixture(
        chain: Vec<Arc<dyn ProviderAdapter>>,
        supplementary: Vec<Arc<dyn ProviderAdapter>>,
        sink: MemorySink,
    ) -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::with_credentials(
            ProviderId::ALL.map(|p| credential(p, p.as_str(), 1, 100)),
        ));
        let orchestrator = Arc::new(FallbackOrchestrator::new(CredentialPool::new(store), chain));
        let ledger = Arc::new(InMemoryUsageLedger::new());
        let sink = Arc::new(sink);
        let service = ImportService::new(orchestrator, ledger.clone(), sink.clone())
            .with_supplementary(
                supplementary
                    .into_iter()
                    .map(SupplementaryProvider::new)
                    .collect(),
            );
        Fixture {
            service,
            ledger,
            sink,
        }
    }

    fn request(user_id: Uuid, tier: Tier, source: &str) -> ImportRequest {
        ImportRequest {
            user_id,
            tier,
            source: source.to_string(),
            requested_at: Utc::now(),
        }
    }

    fn jane_brightdata() -> serde_json::Value {
        json!({
            "name": "Jane Doe",
            "headline": "Staff Engineer",
            "experience": [
                {"title": "Staff Engineer", "company": "Acme"},
                {"title": "Engineer", "company": "Initech"},
                {"title": "Intern", "company": "Globex"}
            ],
            "skills": ["Rust"],
            "certifications": []
        })
    }

    #[tokio::test]
    async fn test_free_tier_quota_blocks_without_calling_providers() {
        let primary = ScriptedAdapter::always_ok(ProviderId::BrightData, jane_brightdata());
        let fx = fixture(vec![primary.clone()], vec![], MemorySink::default());
        let user = Uuid::new_v4();
        let today = Utc::now().date_naive();
        fx.ledger.try_claim(user, today, 2).await.unwrap();
        fx.ledger.try_claim(user, today, 2).await.unwrap();

        let result = fx
            .service
            .import(request(user, Tier::Free, "janedoe"))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ImportErrorKind::QuotaExceeded));
        assert_eq!(result.remaining_imports, 0);
        assert!(result.message.unwrap().contains("limit of 2"));
        assert_eq!(primary.calls(), 0);
        assert_eq!(fx.ledger.used_on(user, today).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_primary_profile_is_supplemented_where_empty() {
        let primary = ScriptedAdapter::always_ok(ProviderId::BrightData, jane_brightdata());
        let rapid = ScriptedAdapter::always_ok(
            ProviderId::RapidApi,
            json!({
                "full_name": "J. Doe",
                "skills": ["Go", "SQL"],
                "certifications": [
                    {"name": "CKA", "authority": "CNCF"},
                    {"name": "AWS SA", "authority": "Amazon"}
                ]
            }),
        );
        let fx = fixture(vec![primary.clone()], vec![rapid.clone()], MemorySink::default());
        let user = Uuid::new_v4();

        let result = fx
            .service
            .import(request(user, Tier::Free, "https://www.linkedin.com/in/janedoe"))
            .await;

        assert!(result.success, "{:?}", result.message);
        let profile = result.profile.unwrap();
        assert_eq!(profile.experience.len(), 3);
        assert_eq!(profile.certifications.len(), 2);
        assert_eq!(profile.personal_info.full_name, "Jane Doe");
        let skills: Vec<&str> = profile.skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skills, vec!["Rust"]);
        assert_eq!(result.source, Some(ProviderId::BrightData));
        assert_eq!(result.supplemented_by, vec![ProviderId::RapidApi]);
        assert_eq!(result.remaining_imports, 1);
        assert_eq!(fx.sink.count(), 1);
        assert_eq!(rapid.calls(), 1);
    }

    #[tokio::test]
    async fn test_supplementary_skipped_when_nothing_to_fill() {
        let complete = json!({
            "name": "Jane Doe",
            "skills": ["Rust"],
            "certifications": [{"name": "CKA"}],
            "languages": ["English"],
            "projects": [{"name": "kit"}]
        });
        let primary = ScriptedAdapter::always_ok(ProviderId::BrightData, complete);
        let rapid = ScriptedAdapter::always_ok(ProviderId::RapidApi, json!({"full_name": "Jane"}));
        let fx = fixture(vec![primary], vec![rapid.clone()], MemorySink::default());

        let result = fx
            .service
            .import(request(Uuid::new_v4(), Tier::Medium, "janedoe"))
            .await;

        assert!(result.success);
        assert_eq!(rapid.calls(), 0);
        assert!(result.supplemented_by.is_empty());
        assert_eq!(result.remaining_imports, 4);
    }

    #[tokio::test]
    async fn test_supplementary_failure_is_only_a_warning() {
        let primary = ScriptedAdapter::always_ok(ProviderId::BrightData, jane_brightdata());
        let rapid = ScriptedAdapter::always_err(
            ProviderId::RapidApi,
            ProviderError::NotFound("no data".into()),
        );
        let fx = fixture(vec![primary], vec![rapid], MemorySink::default());

        let result = fx
            .service
            .import(request(Uuid::new_v4(), Tier::Premium, "janedoe"))
            .await;

        assert!(result.success);
        assert_eq!(result.remaining_imports, -1);
        assert!(result.supplemented_by.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "supplementary.rapidapi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_transient_returns_no_profile_and_keeps_quota() {
        let bd = ScriptedAdapter::always_err(
            ProviderId::BrightData,
            ProviderError::Transient("503".into()),
        );
        let sd = ScriptedAdapter::always_err(
            ProviderId::ScrapingDog,
            ProviderError::Transient("timeout".into()),
        );
        let fx = fixture(vec![bd.clone(), sd.clone()], vec![], MemorySink::default());
        let user = Uuid::new_v4();

        let result = fx
            .service
            .import(request(user, Tier::Free, "janedoe"))
            .await;

        assert!(!result.success);
        assert!(result.profile.is_none());
        assert_eq!(result.error_kind, Some(ImportErrorKind::AllProvidersFailed));
        assert_eq!(result.remaining_imports, 2);
        assert_eq!((bd.calls(), sd.calls()), (3, 3));
        assert_eq!(
            fx.ledger.used_on(user, Utc::now().date_naive()).await.unwrap(),
            0
        );
        assert_eq!(fx.sink.count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_source_fails_before_quota_and_providers() {
        let primary = ScriptedAdapter::always_ok(ProviderId::BrightData, jane_brightdata());
        let fx = fixture(vec![primary.clone()], vec![], MemorySink::default());
        let user = Uuid::new_v4();

        let result = fx
            .service
            .import(request(user, Tier::Medium, "https://example.com/not-a-profile"))
            .await;

        assert_eq!(result.error_kind, Some(ImportErrorKind::InvalidSource));
        assert_eq!(result.remaining_imports, 5);
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_handoff_failure_fails_import_and_releases_quota() {
        let primary = ScriptedAdapter::always_ok(ProviderId::BrightData, jane_brightdata());
        let fx = fixture(vec![primary], vec![], MemorySink::failing());
        let user = Uuid::new_v4();

        let result = fx
            .service
            .import(request(user, Tier::Free, "janedoe"))
            .await;

        assert_eq!(result.error_kind, Some(ImportErrorKind::HandoffFailed));
        assert!(result.profile.is_none());
        assert_eq!(result.remaining_imports, 2);
        assert_eq!(
            fx.ledger.used_on(user, Utc::now().date_naive()).await.unwrap(),
            0
        );
    }

    struct UnreachableLedger;

    #[async_trait::async_trait]
    impl UsageLedger for UnreachableLedger {
        async fn used_on(&self, _: Uuid, _: chrono::NaiveDate) -> Result<u32, LedgerError> {
            Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into())
        }

        async fn try_claim(
            &self,
            _: Uuid,
            _: chrono::NaiveDate,
            _: u32,
        ) -> Result<Option<u32>, LedgerError> {
            Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into())
        }

        async fn release(&self, _: Uuid, _: chrono::NaiveDate) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ledger_failure_is_internal_even_for_invalid_source() {
        let primary = ScriptedAdapter::always_ok(ProviderId::BrightData, jane_brightdata());
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            ProviderId::BrightData,
            "bd",
            1,
            10,
        )]));
        let chain: Vec<Arc<dyn ProviderAdapter>> = vec![primary.clone()];
        let orchestrator = Arc::new(FallbackOrchestrator::new(CredentialPool::new(store), chain));
        let service = ImportService::new(
            orchestrator,
            Arc::new(UnreachableLedger),
            Arc::new(MemorySink::default()),
        );

        let invalid = service
            .import(request(Uuid::new_v4(), Tier::Free, "https://example.com/x"))
            .await;
        assert_eq!(invalid.error_kind, Some(ImportErrorKind::Internal));
        assert_eq!(invalid.remaining_imports, 0);

        let valid = service
            .import(request(Uuid::new_v4(), Tier::Free, "janedoe"))
            .await;
        assert_eq!(valid.error_kind, Some(ImportErrorKind::Internal));
        assert_eq!(primary.calls(), 0);
    }

    #[test]
    fn test_request_time_is_never_taken_from_the_body() {
        let request: ImportRequest = serde_json::from_value(json!({
            "user_id": Uuid::nil(),
            "tier": "free",
            "source": "janedoe",
            "requested_at": "2001-01-01T00:00:00Z"
        }))
        .unwrap();
        let stale = chrono::NaiveDate::from_ymd_opt(2001, 1, 2).unwrap();
        assert!(request.requested_at.date_naive() > stale);
    }

    #[test]
    fn test_result_serializes_camel_case_with_arrays() {
        let result = ImportResult::failed(ImportErrorKind::QuotaExceeded, 0, "limit");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errorKind"], "quota_exceeded");
        assert_eq!(json["remainingImports"], 0);
        assert_eq!(json["supplementedBy"], json!([]));
        assert!(json.get("profile").is_none());
    }
}
