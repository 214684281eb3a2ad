//! Fingerprint (§3): "the stable hash of (normalized query, ordered filter
//! fields, provider) used as the cache key."

use research_search::SearchFilters;

use crate::store::CacheStore;

/// Lowercase, trim, and collapse internal whitespace so trivially
/// different renderings of the same query (extra spaces, casing) hash the
/// same way.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// §3: "hash(normalized query | freshness | country | language | count |
/// offset | included-domains-sorted | excluded-domains-sorted | provider)".
#[must_use]
pub fn compute_fingerprint(query: &str, filters: &SearchFilters, provider: &str) -> String {
    let normalized = normalize_query(query);
    let equivalence = filters.equivalence_key();
    let (include, exclude) = filters.sorted_domains();
    let composed = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}",
        normalized,
        equivalence.freshness.unwrap_or_default(),
        equivalence.country.unwrap_or_default(),
        equivalence.language.unwrap_or_default(),
        equivalence.count,
        filters.offset,
        include.join(","),
        exclude.join(","),
        provider,
    );
    CacheStore::hash_key(&composed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  AI   Trends  2025 "), "ai trends 2025");
    }

    #[test]
    fn fingerprint_is_stable_for_equivalent_inputs() {
        let filters_a = SearchFilters {
            include_domains: vec!["a.com".into(), "b.com".into()],
            ..Default::default()
        };
        let filters_b = SearchFilters {
            include_domains: vec!["b.com".into(), "a.com".into()],
            ..Default::default()
        };
        let fp_a = compute_fingerprint("AI Trends 2025", &filters_a, "serper");
        let fp_b = compute_fingerprint("ai trends 2025", &filters_b, "serper");
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn fingerprint_differs_by_provider() {
        let filters = SearchFilters::default();
        let fp_a = compute_fingerprint("q", &filters, "serper");
        let fp_b = compute_fingerprint("q", &filters, "brave");
        assert_ne!(fp_a, fp_b);
    }
}
