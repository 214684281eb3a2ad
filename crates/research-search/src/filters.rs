//! `SearchFilters` (§4.B): a closed configuration record, not a loose
//! typed bag (SPEC_FULL.md §9) — unknown fields are rejected.

use serde::{Deserialize, Serialize};

/// Relative freshness window. `pd`=past day, `pw`=past week, `pm`=past
/// month, `py`=past year — the vendor-neutral vocabulary most search APIs
/// converge on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Pd,
    Pw,
    Pm,
    Py,
}

impl Freshness {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Freshness::Pd => "pd",
            Freshness::Pw => "pw",
            Freshness::Pm => "pm",
            Freshness::Py => "py",
        }
    }
}

/// Either a relative window or an absolute `[dateFrom, dateTo]` range
/// (§4.B "Date-range filters support either relative windows ... or
/// absolute").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateRange {
    Relative(Freshness),
    Absolute { date_from: String, date_to: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Off,
    Moderate,
    Strict,
}

/// §4.B `SearchFilters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchFilters {
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub offset: u32,
    pub date_range: Option<DateRange>,
    pub country: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub safesearch: Option<SafeSearch>,
    #[serde(default)]
    pub include_domains: Vec<String>,
    #[serde(default)]
    pub exclude_domains: Vec<String>,
}

fn default_count() -> u32 {
    10
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            count: default_count(),
            offset: 0,
            date_range: None,
            country: None,
            language: None,
            safesearch: None,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
        }
    }
}

impl SearchFilters {
    /// §4.B: "`offset` must be aligned to `count`; implementations warn and
    /// round down when not." Returns the aligned offset; logs a warning if
    /// it had to round.
    #[must_use]
    pub fn aligned_offset(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        let remainder = self.offset % self.count;
        if remainder != 0 {
            tracing::warn!(
                offset = self.offset,
                count = self.count,
                "search offset is not aligned to count; rounding down"
            );
            self.offset - remainder
        } else {
            self.offset
        }
    }

    /// Appends `site:`/`-site:` operators for vendors without native
    /// domain filtering (§4.B). Returns the augmented query string; the
    /// original domain lists are left untouched in `self` since the
    /// fingerprint (§3) is computed from the filters, not the rewritten
    /// query text.
    #[must_use]
    pub fn apply_domain_operators(&self, query: &str) -> String {
        let mut parts = vec![query.to_string()];
        for domain in &self.include_domains {
            parts.push(format!("site:{domain}"));
        }
        for domain in &self.exclude_domains {
            parts.push(format!("-site:{domain}"));
        }
        parts.join(" ")
    }

    /// The subset of fields §4.D's semantic-dedup filter-equivalence check
    /// compares: `{freshness, country, language, count}`. Domains and
    /// offset are deliberately excluded — two queries differing only in
    /// pagination or extra excluded domains are still "the same search"
    /// for dedup purposes per the spec's named field list.
    #[must_use]
    pub fn equivalence_key(&self) -> FilterEquivalenceKey {
        let freshness = match &self.date_range {
            Some(DateRange::Relative(f)) => Some(f.as_str().to_string()),
            Some(DateRange::Absolute { date_from, date_to }) => {
                Some(format!("{date_from}..{date_to}"))
            }
            None => None,
        };
        FilterEquivalenceKey {
            freshness,
            country: self.country.clone(),
            language: self.language.clone(),
            count: self.count,
        }
    }

    /// Sorted copies of the domain lists, used by the cache fingerprint
    /// (§3: "excluded-domains-sorted") so list order never affects the key.
    #[must_use]
    pub fn sorted_domains(&self) -> (Vec<String>, Vec<String>) {
        let mut include = self.include_domains.clone();
        let mut exclude = self.exclude_domains.clone();
        include.sort();
        exclude.sort();
        (include, exclude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterEquivalenceKey {
    pub freshness: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_offset_rounds_down_to_multiple_of_count() {
        let filters = SearchFilters {
            count: 10,
            offset: 25,
            ..Default::default()
        };
        assert_eq!(filters.aligned_offset(), 20);
    }

    #[test]
    fn aligned_offset_is_noop_when_already_aligned() {
        let filters = SearchFilters {
            count: 10,
            offset: 30,
            ..Default::default()
        };
        assert_eq!(filters.aligned_offset(), 30);
    }

    #[test]
    fn domain_operators_append_site_and_negated_site() {
        let filters = SearchFilters {
            include_domains: vec!["nytimes.com".into()],
            exclude_domains: vec!["pinterest.com".into()],
            ..Default::default()
        };
        let query = filters.apply_domain_operators("ai trends");
        assert_eq!(query, "ai trends site:nytimes.com -site:pinterest.com");
    }

    #[test]
    fn equivalence_key_ignores_domains_and_offset() {
        let a = SearchFilters {
            offset: 0,
            include_domains: vec!["a.com".into()],
            ..Default::default()
        };
        let b = SearchFilters {
            offset: 10,
            include_domains: vec!["b.com".into()],
            ..Default::default()
        };
        assert_eq!(a.equivalence_key(), b.equivalence_key());
    }

    #[test]
    fn equivalence_key_distinguishes_freshness() {
        let a = SearchFilters {
            date_range: Some(DateRange::Relative(Freshness::Pd)),
            ..Default::default()
        };
        let b = SearchFilters {
            date_range: Some(DateRange::Relative(Freshness::Pw)),
            ..Default::default()
        };
        assert_ne!(a.equivalence_key(), b.equivalence_key());
    }

    #[test]
    fn sorted_domains_are_order_independent() {
        let a = SearchFilters {
            include_domains: vec!["z.com".into(), "a.com".into()],
            ..Default::default()
        };
        let b = SearchFilters {
            include_domains: vec!["a.com".into(), "z.com".into()],
            ..Default::default()
        };
        assert_eq!(a.sorted_domains(), b.sorted_domains());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = serde_json::json!({"count": 10, "bogus": true});
        let result: Result<SearchFilters, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
