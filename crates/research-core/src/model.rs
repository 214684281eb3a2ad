//! Data model (§3): Project, DeliveryLog, SearchCacheEntry, QueryEmbedding,
//! ProviderHealth, Job, and the configuration records they embed.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Milliseconds since the Unix epoch. A newtype so pipeline and scheduler
/// code never has to guess whether a bare `i64` is seconds or millis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochMillis(pub i64);

impl EpochMillis {
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    #[must_use]
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    #[must_use]
    pub fn to_datetime(self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.0).unwrap_or_else(chrono::Utc::now)
    }
}

impl fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(ProjectId);
uuid_id!(UserId);
uuid_id!(DeliveryLogId);
uuid_id!(JobId);

/// §3 `frequency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Once,
}

/// §3 `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectStatus {
    Active,
    Paused,
    Running,
    Error,
    Deleted,
}

/// §3 `searchParameters`. Closed record: unknown fields are rejected so a
/// malformed document-store payload fails fast instead of silently losing
/// a field (SPEC_FULL.md §9).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchParameters {
    #[serde(default)]
    pub priority_domains: Vec<String>,
    #[serde(default)]
    pub excluded_domains: Vec<String>,
    #[serde(default)]
    pub required_keywords: Vec<String>,
    #[serde(default)]
    pub excluded_keywords: Vec<String>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub output_language: Option<String>,
    pub date_range_preference: Option<String>,
}

/// §3 Project. The authoritative record; lives in `research-store`'s
/// Postgres-backed project store in this port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub frequency: Frequency,
    /// "HH:MM" local time.
    pub delivery_time: String,
    /// IANA zone name, e.g. "America/New_York".
    pub timezone: String,
    /// 1-7 for weekly (ISO weekday, 1=Monday).
    pub day_of_week: Option<u8>,
    /// 1-31 for monthly.
    pub day_of_month: Option<u8>,
    pub status: ProjectStatus,
    /// Delivery address for this project's reports. User profile storage
    /// is out of scope (§1), so this is the one user-identifying field
    /// the project record itself has to carry to make delivery possible.
    pub recipient_email: String,
    pub search_parameters: SearchParameters,
    pub next_run_at: Option<EpochMillis>,
    pub last_run_at: Option<EpochMillis>,
    pub research_started_at: Option<EpochMillis>,
    pub prepared_delivery_log_id: Option<DeliveryLogId>,
    pub prepared_at: Option<EpochMillis>,
    pub delivered_at: Option<EpochMillis>,
    pub last_error: Option<String>,
    pub this_run_is_one_shot: bool,
}

impl Project {
    /// §3 invariant: `status=running` implies `researchStartedAt != null`.
    #[must_use]
    pub fn running_invariant_holds(&self) -> bool {
        self.status != ProjectStatus::Running || self.research_started_at.is_some()
    }

    /// §3 invariant: exactly one of {prepared is null, prepared is set} —
    /// trivially true for an `Option`, kept as a named predicate so callers
    /// read intent rather than re-deriving it from `.is_some()`.
    #[must_use]
    pub fn has_prepared_log(&self) -> bool {
        self.prepared_delivery_log_id.is_some()
    }
}

/// §3 DeliveryLog `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    Partial,
}

/// §3 DeliveryLog stats (durations, counts, cost estimate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub query_generation_ms: u64,
    pub search_ms: u64,
    pub extraction_ms: u64,
    pub relevancy_ms: u64,
    pub analysis_ms: u64,
    pub compilation_ms: u64,
    pub queries_issued: u32,
    pub results_found: u32,
    pub results_relevant: u32,
    pub estimated_cost_usd: f64,
}

/// §3 DeliveryLog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLog {
    pub id: DeliveryLogId,
    pub project_id: ProjectId,
    pub status: DeliveryStatus,
    pub report_title: String,
    pub report_markdown: String,
    pub report_summary: String,
    pub delivered_at: Option<EpochMillis>,
    pub retry_count: u32,
    pub stats: DeliveryStats,
    pub error: Option<String>,
}

/// §3 SearchCacheEntry metadata sibling: `hits`, `firstCached`,
/// `lastAccessed`, `provider`. The value itself (a `SearchResponse`) is
/// opaque JSON from `research-core`'s point of view — `research-cache`
/// owns serializing/deserializing it against `research-search`'s type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCacheMetadata {
    pub hits: u64,
    pub first_cached: EpochMillis,
    pub last_accessed: EpochMillis,
    pub provider: String,
}

/// §3 QueryEmbedding: one entry per previously issued query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEmbedding {
    pub normalized_query: String,
    pub embedding: Vec<f32>,
    pub timestamp: EpochMillis,
    /// Opaque summary of the filter fields dedup compares on (§4.D),
    /// produced by `research-search::filters::FilterEquivalenceKey`.
    pub filters_summary: String,
    pub cache_key: String,
}

/// §3 ProviderHealth (in-process).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub last_success: Option<EpochMillis>,
    pub last_failure: Option<EpochMillis>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
            last_success: None,
            last_failure: None,
        }
    }
}

/// §3 Job payload, shared shape for research and delivery jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobPayload {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub project_title: String,
    /// Copied from `Project::recipient_email` at enqueue time, the same
    /// way `project_title` is denormalized onto the job.
    pub recipient_email: String,
    pub next_run_at: Option<EpochMillis>,
    pub is_run_now: bool,
    pub is_one_shot: bool,
}

impl JobPayload {
    /// §4.G: "the job identity incorporates `(projectId, nextRunAt)`" so a
    /// re-schedule before a prior job completes is a no-op.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        match self.next_run_at {
            Some(t) => format!("{}:{}", self.project_id, t),
            None => format!("{}:none", self.project_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_invariant_detects_violation() {
        let mut project = sample_project();
        project.status = ProjectStatus::Running;
        project.research_started_at = None;
        assert!(!project.running_invariant_holds());

        project.research_started_at = Some(EpochMillis::now());
        assert!(project.running_invariant_holds());
    }

    #[test]
    fn idempotency_key_is_stable_for_same_project_and_run() {
        let payload = sample_job();
        assert_eq!(payload.idempotency_key(), payload.idempotency_key());
    }

    #[test]
    fn idempotency_key_differs_across_next_run_at() {
        let mut a = sample_job();
        let mut b = sample_job();
        a.project_id = ProjectId(Uuid::nil());
        b.project_id = ProjectId(Uuid::nil());
        a.next_run_at = Some(EpochMillis(1_000));
        b.next_run_at = Some(EpochMillis(2_000));
        assert_ne!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn search_parameters_reject_unknown_fields() {
        let json = serde_json::json!({"priorityDomains": [], "bogus": true});
        let result: Result<SearchParameters, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    fn sample_project() -> Project {
        Project {
            id: ProjectId::new(),
            user_id: UserId::new(),
            title: "AI trends".into(),
            description: "Weekly AI trend digest".into(),
            frequency: Frequency::Weekly,
            delivery_time: "09:00".into(),
            timezone: "UTC".into(),
            day_of_week: Some(1),
            day_of_month: None,
            status: ProjectStatus::Active,
            recipient_email: "reader@example.com".into(),
            search_parameters: SearchParameters::default(),
            next_run_at: None,
            last_run_at: None,
            research_started_at: None,
            prepared_delivery_log_id: None,
            prepared_at: None,
            delivered_at: None,
            last_error: None,
            this_run_is_one_shot: false,
        }
    }

    fn sample_job() -> JobPayload {
        JobPayload {
            user_id: UserId::new(),
            project_id: ProjectId::new(),
            project_title: "AI trends".into(),
            recipient_email: "reader@example.com".into(),
            next_run_at: Some(EpochMillis::now()),
            is_run_now: false,
            is_one_shot: false,
        }
    }
}
