//! Search Cache half of §4.D: freshness-aware caching of search responses
//! keyed by fingerprint, with TTL-with-jitter and a popularity bump.

use rand::Rng;

use research_core::config::SearchCacheTuning;
use research_core::model::{EpochMillis, SearchCacheMetadata};
use research_search::{SearchFilters, SearchResponse};

use crate::fingerprint::compute_fingerprint;
use crate::store::CacheStore;

const VALUE_PREFIX: &str = "search:";
const META_PREFIX: &str = "search:meta:";

/// §8 property 6: "After ≥ `popularThreshold` hits on a key, re-setting
/// the key uses `popularTtl` within jitter bounds." A free function (not a
/// method) so it is testable without a live cache connection.
fn ttl_with_jitter(tuning: &SearchCacheTuning, hits: u64) -> u64 {
    let base = if hits >= tuning.popular_threshold {
        tuning.popular_ttl_secs
    } else {
        tuning.base_ttl_secs
    };
    let jitter_fraction = rand::thread_rng().gen_range(0.0..tuning.ttl_jitter.max(0.0));
    (base as f64 * (1.0 + jitter_fraction)).round() as u64
}

pub struct SearchCache {
    store: CacheStore,
    tuning: SearchCacheTuning,
}

impl SearchCache {
    #[must_use]
    pub fn new(store: CacheStore, tuning: SearchCacheTuning) -> Self {
        Self { store, tuning }
    }

    /// On hit, increments metadata `hits` and updates `lastAccessed`
    /// (§4.D). Metadata updates are best-effort, non-atomic read-then-write
    /// (a lost increment under concurrent hits only under-counts
    /// popularity, never corrupts the cached value itself).
    pub async fn get(
        &self,
        query: &str,
        filters: &SearchFilters,
        provider: &str,
    ) -> Option<SearchResponse> {
        let fp = compute_fingerprint(query, filters, provider);
        let raw = self.store.get(&format!("{VALUE_PREFIX}{fp}")).await?;
        let response: SearchResponse = serde_json::from_value(raw).ok()?;

        if let Some(mut meta) = self.read_metadata(&fp).await {
            meta.hits += 1;
            meta.last_accessed = EpochMillis::now();
            self.write_metadata(&fp, &meta).await;
        }

        Some(response)
    }

    /// §4.D: TTL is `popularTtl` once `hits ≥ popularThreshold`, else
    /// `baseTtl`, with multiplicative jitter `ttl · (1 + U[0,jitter])`.
    pub async fn set(
        &self,
        query: &str,
        filters: &SearchFilters,
        provider: &str,
        response: &SearchResponse,
    ) {
        let fp = compute_fingerprint(query, filters, provider);
        let existing_hits = self.read_metadata(&fp).await.map(|m| m.hits).unwrap_or(0);
        let ttl = ttl_with_jitter(&self.tuning, existing_hits);

        let Ok(value) = serde_json::to_value(response) else {
            tracing::warn!("failed to serialize search response for caching");
            return;
        };
        self.store
            .set(&format!("{VALUE_PREFIX}{fp}"), &value, ttl)
            .await;

        let now = EpochMillis::now();
        let meta = SearchCacheMetadata {
            hits: existing_hits,
            first_cached: now,
            last_accessed: now,
            provider: provider.to_string(),
        };
        self.write_metadata(&fp, &meta).await;
    }

    /// Semantic dedup's hit path (§4.D): the dedup index stores the
    /// fingerprint of the query that produced a cached response, not the
    /// query text itself, so a near-duplicate query can reuse it directly
    /// without recomputing a fingerprint it would not match.
    pub async fn get_by_cache_key(&self, cache_key: &str) -> Option<SearchResponse> {
        let raw = self.store.get(&format!("{VALUE_PREFIX}{cache_key}")).await?;
        serde_json::from_value(raw).ok()
    }

    pub async fn invalidate(&self, query: &str, filters: &SearchFilters, provider: &str) {
        let fp = compute_fingerprint(query, filters, provider);
        self.store.delete(&format!("{VALUE_PREFIX}{fp}")).await;
        self.store.delete(&format!("{META_PREFIX}{fp}")).await;
    }

    pub async fn invalidate_all(&self) {
        self.store.delete_pattern(&format!("{VALUE_PREFIX}*")).await;
        self.store.delete_pattern(&format!("{META_PREFIX}*")).await;
    }

    async fn read_metadata(&self, fingerprint: &str) -> Option<SearchCacheMetadata> {
        let raw = self.store.get(&format!("{META_PREFIX}{fingerprint}")).await?;
        serde_json::from_value(raw).ok()
    }

    async fn write_metadata(&self, fingerprint: &str, meta: &SearchCacheMetadata) {
        if let Ok(value) = serde_json::to_value(meta) {
            self.store
                .set(&format!("{META_PREFIX}{fingerprint}"), &value, 0)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_with_jitter_stays_within_bounds_for_base_ttl() {
        let tuning = SearchCacheTuning {
            base_ttl_secs: 100,
            popular_ttl_secs: 1000,
            ttl_jitter: 0.1,
            popular_threshold: 5,
        };
        for _ in 0..100 {
            let ttl = ttl_with_jitter(&tuning, 0);
            assert!(ttl >= 100 && ttl <= 110, "ttl {ttl} out of bounds");
        }
    }

    #[test]
    fn ttl_with_jitter_uses_popular_ttl_past_threshold() {
        let tuning = SearchCacheTuning {
            base_ttl_secs: 100,
            popular_ttl_secs: 1000,
            ttl_jitter: 0.1,
            popular_threshold: 5,
        };
        let ttl = ttl_with_jitter(&tuning, 5);
        assert!(ttl >= 1000 && ttl <= 1100, "ttl {ttl} out of bounds");
    }

    #[test]
    fn ttl_with_jitter_just_below_threshold_uses_base_ttl() {
        let tuning = SearchCacheTuning {
            base_ttl_secs: 100,
            popular_ttl_secs: 1000,
            ttl_jitter: 0.0,
            popular_threshold: 5,
        };
        assert_eq!(ttl_with_jitter(&tuning, 4), 100);
    }
}
