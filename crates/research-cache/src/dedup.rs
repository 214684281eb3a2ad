//! Semantic Dedup half of §4.D: embedding-based reuse of cached search
//! responses for queries that are not textually identical but mean the
//! same thing in the same filter context.
//!
//! The embedding index is a single JSON array stored under one cache key
//! (`embed:index`), TTL'd to `windowHours` on every write so it never grows
//! past the recency window the spec defines similarity comparisons over.

use research_core::config::SemanticDedupTuning;
use research_core::model::{EpochMillis, QueryEmbedding};
use research_search::SearchFilters;

use crate::fingerprint::{compute_fingerprint, normalize_query};
use crate::store::CacheStore;

const INDEX_KEY: &str = "embed:index";

/// Outcome of a dedup lookup: either reuse the named cache key verbatim, or
/// fall through to a live search (recording the new embedding either way).
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    Hit { cache_key: String },
    Miss,
}

pub struct SemanticDedup {
    store: CacheStore,
    tuning: SemanticDedupTuning,
}

impl SemanticDedup {
    #[must_use]
    pub fn new(store: CacheStore, tuning: SemanticDedupTuning) -> Self {
        Self { store, tuning }
    }

    /// §4.D: "compare by cosine similarity against all stored embeddings in
    /// the recency window; if the best match is ≥ threshold and the filter
    /// summaries are equivalent, reuse the cached search response... store
    /// the new embedding and proceed with a live search" otherwise.
    ///
    /// Fails open (§4.D "dedup must fail open"): any error reading or
    /// writing the index is logged and treated as a miss, never propagated.
    pub async fn check_and_record(
        &self,
        query: &str,
        filters: &SearchFilters,
        provider: &str,
        embedding: Vec<f32>,
    ) -> DedupOutcome {
        let normalized = normalize_query(query);
        let equivalence = filters.equivalence_key();
        let now = EpochMillis::now();
        let window_ms = self.tuning.window_hours.saturating_mul(3_600_000) as i64;
        let cutoff = now.0.saturating_sub(window_ms);

        let mut index = self.read_index().await;
        index.retain(|entry| entry.timestamp.0 >= cutoff);

        let best = index
            .iter()
            .filter(|entry| entry.filters_summary == filters_summary(&equivalence))
            .map(|entry| (cosine_similarity(&entry.embedding, &embedding), entry))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let outcome = match best {
            Some((similarity, entry)) if similarity >= self.tuning.similarity_threshold => {
                DedupOutcome::Hit {
                    cache_key: entry.cache_key.clone(),
                }
            }
            _ => DedupOutcome::Miss,
        };

        index.push(QueryEmbedding {
            normalized_query: normalized,
            embedding,
            timestamp: now,
            filters_summary: filters_summary(&equivalence),
            cache_key: compute_fingerprint(query, filters, provider),
        });
        self.write_index(&index).await;

        outcome
    }

    async fn read_index(&self) -> Vec<QueryEmbedding> {
        match self.store.get(INDEX_KEY).await {
            Some(raw) => serde_json::from_value(raw).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn write_index(&self, index: &[QueryEmbedding]) {
        let ttl = self.tuning.window_hours.saturating_mul(3600);
        if let Ok(value) = serde_json::to_value(index) {
            self.store.set(INDEX_KEY, &value, ttl).await;
        } else {
            tracing::warn!("failed to serialize semantic dedup index; skipping write");
        }
    }
}

/// Opaque string form of `{freshness, country, language, count}` used as an
/// equality check between two queries' filter contexts (§4.D, §8 property 7).
fn filters_summary(key: &research_search::filters::FilterEquivalenceKey) -> String {
    format!(
        "{}|{}|{}|{}",
        key.freshness.as_deref().unwrap_or(""),
        key.country.as_deref().unwrap_or(""),
        key.language.as_deref().unwrap_or(""),
        key.count,
    )
}

/// Cosine similarity of two equal-length vectors; `0.0` for mismatched
/// lengths or a zero-magnitude vector, so a corrupt or empty embedding is
/// simply never a match rather than a division-by-zero panic.
#[must_use]
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
