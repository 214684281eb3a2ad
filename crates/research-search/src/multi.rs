//! Multi-Provider Orchestrator (§4.E): health-tracked failover across an
//! ordered `{primary, fallback, free}` list with consecutive-failure
//! circuit-breaking and cool-down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use research_core::model::{EpochMillis, ProviderHealth};

use crate::error::SearchError;
use crate::filters::SearchFilters;
use crate::provider::SearchProvider;
use crate::result::SearchResponse;

/// §4.E tuning: `failureThreshold` consecutive failures mark a provider
/// unhealthy; `recoveryTimeout` is the cool-down before it is probed again.
#[derive(Debug, Clone, Copy)]
pub struct MultiProviderConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for MultiProviderConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(300),
        }
    }
}

/// `search.provider = multi` (§6, §9): an ordered, growable list of
/// providers behind a single `SearchProvider` implementation, rather than
/// an enum of concrete variants.
pub struct MultiProvider {
    providers: Vec<(String, Arc<dyn SearchProvider>)>,
    health: DashMap<String, ProviderHealth>,
    config: MultiProviderConfig,
}

impl MultiProvider {
    #[must_use]
    pub fn new(providers: Vec<(String, Arc<dyn SearchProvider>)>, config: MultiProviderConfig) -> Self {
        let health = DashMap::new();
        for (name, _) in &providers {
            health.insert(name.clone(), ProviderHealth::default());
        }
        Self {
            providers,
            health,
            config,
        }
    }

    #[must_use]
    pub fn health_snapshot(&self, name: &str) -> Option<ProviderHealth> {
        self.health.get(name).map(|h| h.clone())
    }

    fn is_eligible(&self, name: &str) -> bool {
        let Some(health) = self.health.get(name) else {
            return true;
        };
        if health.healthy {
            return true;
        }
        match health.last_failure {
            Some(last_failure) => {
                let elapsed_ms = EpochMillis::now().0 - last_failure.0;
                elapsed_ms >= self.config.recovery_timeout.as_millis() as i64
            }
            None => true,
        }
    }

    fn record_success(&self, name: &str) {
        self.health
            .entry(name.to_string())
            .and_modify(|h| {
                h.healthy = true;
                h.consecutive_failures = 0;
                h.total_requests += 1;
                h.last_success = Some(EpochMillis::now());
            })
            .or_insert_with(|| ProviderHealth {
                total_requests: 1,
                last_success: Some(EpochMillis::now()),
                ..ProviderHealth::default()
            });
    }

    fn record_failure(&self, name: &str) {
        self.health
            .entry(name.to_string())
            .and_modify(|h| {
                h.total_requests += 1;
                h.total_failures += 1;
                h.consecutive_failures += 1;
                h.last_failure = Some(EpochMillis::now());
                if h.consecutive_failures >= self.config.failure_threshold {
                    h.healthy = false;
                }
            })
            .or_insert_with(|| {
                let now = EpochMillis::now();
                ProviderHealth {
                    healthy: self.config.failure_threshold > 1,
                    consecutive_failures: 1,
                    total_requests: 1,
                    total_failures: 1,
                    last_success: None,
                    last_failure: Some(now),
                }
            });
    }
}

#[async_trait]
impl SearchProvider for MultiProvider {
    fn name(&self) -> &str {
        "multi"
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        let mut last_error: Option<SearchError> = None;
        for (name, provider) in &self.providers {
            if !self.is_eligible(name) {
                continue;
            }
            match provider.search(query, filters).await {
                Ok(response) => {
                    self.record_success(name);
                    return Ok(response);
                }
                Err(err) => {
                    tracing::warn!(provider = %name, error = %err, "search provider failed, trying next");
                    self.record_failure(name);
                    last_error = Some(err);
                }
            }
        }
        Err(SearchError::AllProvidersExhausted(
            last_error.map(|e| e.to_string()).unwrap_or_else(|| {
                "no configured provider was eligible for this request".to_string()
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::SearchResultItem;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        name: String,
        failures_remaining: AtomicU32,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(name: &str, failures_remaining: u32) -> Self {
            Self {
                name: name.to_string(),
                failures_remaining: AtomicU32::new(failures_remaining),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(
            &self,
            _query: &str,
            _filters: &SearchFilters,
        ) -> Result<SearchResponse, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(SearchError::Response("500".into()));
            }
            Ok(SearchResponse {
                items: vec![SearchResultItem {
                    title: "ok".into(),
                    url: "https://example.com".into(),
                    description: String::new(),
                    published_date: None,
                    thumbnail: None,
                    meta: serde_json::Value::Null,
                }],
                provider: self.name.clone(),
            })
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_provider_on_first_failure() {
        let primary = Arc::new(ScriptedProvider::new("primary", 10));
        let fallback = Arc::new(ScriptedProvider::new("fallback", 0));
        let multi = MultiProvider::new(
            vec![
                ("primary".into(), primary.clone()),
                ("fallback".into(), fallback.clone()),
            ],
            MultiProviderConfig::default(),
        );

        let response = multi
            .search("ai trends", &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(response.provider, "fallback");
    }

    #[tokio::test]
    async fn marks_unhealthy_after_failure_threshold_consecutive_failures() {
        let primary = Arc::new(ScriptedProvider::new("primary", 10));
        let fallback = Arc::new(ScriptedProvider::new("fallback", 0));
        let multi = MultiProvider::new(
            vec![
                ("primary".into(), primary.clone()),
                ("fallback".into(), fallback.clone()),
            ],
            MultiProviderConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_secs(300),
            },
        );

        for _ in 0..3 {
            let _ = multi.search("q", &SearchFilters::default()).await;
        }
        let health = multi.health_snapshot("primary").unwrap();
        assert!(!health.healthy);
        assert_eq!(health.consecutive_failures, 3);
    }

    #[tokio::test]
    async fn unhealthy_provider_is_skipped_until_recovery_timeout() {
        let primary = Arc::new(ScriptedProvider::new("primary", 10));
        let fallback = Arc::new(ScriptedProvider::new("fallback", 0));
        let multi = MultiProvider::new(
            vec![
                ("primary".into(), primary.clone()),
                ("fallback".into(), fallback.clone()),
            ],
            MultiProviderConfig {
                failure_threshold: 1,
                recovery_timeout: Duration::from_secs(3600),
            },
        );

        let _ = multi.search("q", &SearchFilters::default()).await;
        assert!(!multi.health_snapshot("primary").unwrap().healthy);

        // Primary is skipped entirely on the next call (still within cooldown).
        let calls_before = primary.calls.load(Ordering::SeqCst);
        let response = multi.search("q2", &SearchFilters::default()).await.unwrap();
        assert_eq!(response.provider, "fallback");
        assert_eq!(primary.calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn all_providers_exhausted_when_every_provider_fails() {
        let primary = Arc::new(ScriptedProvider::new("primary", 10));
        let multi = MultiProvider::new(
            vec![("primary".into(), primary.clone())],
            MultiProviderConfig::default(),
        );
        let result = multi.search("q", &SearchFilters::default()).await;
        assert!(matches!(result, Err(SearchError::AllProvidersExhausted(_))));
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let primary = Arc::new(ScriptedProvider::new("primary", 2));
        let multi = MultiProvider::new(
            vec![("primary".into(), primary.clone())],
            MultiProviderConfig {
                failure_threshold: 5,
                recovery_timeout: Duration::from_secs(300),
            },
        );
        let _ = multi.search("q1", &SearchFilters::default()).await;
        let _ = multi.search("q2", &SearchFilters::default()).await;
        let _ = multi.search("q3", &SearchFilters::default()).await;
        let health = multi.health_snapshot("primary").unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.healthy);
    }
}
