//! Brave Search `SearchProvider` implementation. Shares the same builder/
//! client/retry/rate-limit shape as `research-search-serper`; differs in
//! that Brave's API natively accepts `freshness` codes, so this
//! implementation passes them straight through instead of translating to a
//! vendor-specific operator, while domain restriction still falls back to
//! `site:`/`-site:` query operators since Brave has no native parameter for
//! it (§4.B: "when the vendor lacks native support").

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use research_search::{
    http, json_with_limit, retry::with_backoff, DateRange, RateLimiter, SearchError,
    SearchFilters, SearchProvider, SearchResponse, SearchResultItem,
};

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
/// §4.B example floor: "≥500 ms for another [provider]".
const SELF_RATE_LIMIT_FLOOR: Duration = Duration::from_millis(500);

pub struct BraveProvider {
    api_key: String,
    client: reqwest::Client,
    rate_limiter: RateLimiter,
}

pub struct BraveProviderBuilder {
    api_key: Option<String>,
}

impl BraveProviderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { api_key: None }
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn build(self) -> Result<BraveProvider, SearchError> {
        let api_key = self
            .api_key
            .ok_or_else(|| SearchError::Configuration("brave api key is required".into()))?;
        Ok(BraveProvider {
            api_key,
            client: http::build_client(),
            rate_limiter: RateLimiter::new(SELF_RATE_LIMIT_FLOOR),
        })
    }
}

impl Default for BraveProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Deserialize)]
struct BraveResponseBody {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    age: Option<String>,
    thumbnail: Option<BraveThumbnail>,
}

#[derive(Debug, Deserialize)]
struct BraveThumbnail {
    src: String,
}

impl BraveProvider {
    fn query_params(&self, query: &str, filters: &SearchFilters) -> Vec<(String, String)> {
        let augmented_query = filters.apply_domain_operators(query);
        let aligned_offset = filters.aligned_offset();
        let offset_pages = if filters.count == 0 {
            0
        } else {
            aligned_offset / filters.count
        };
        let mut params = vec![
            ("q".to_string(), augmented_query),
            ("count".to_string(), filters.count.to_string()),
            ("offset".to_string(), offset_pages.to_string()),
        ];
        if let Some(country) = &filters.country {
            params.push(("country".to_string(), country.clone()));
        }
        if let Some(language) = &filters.language {
            params.push(("search_lang".to_string(), language.clone()));
        }
        if let Some(DateRange::Relative(freshness)) = &filters.date_range {
            params.push(("freshness".to_string(), freshness.as_str().to_string()));
        }
        params
    }

    async fn search_once(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        self.rate_limiter.acquire().await;
        let response = self
            .client
            .get(BRAVE_ENDPOINT)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&self.query_params(query, filters))
            .send()
            .await
            .map_err(SearchError::Request)?;

        let body: BraveResponseBody =
            json_with_limit(response, http::RESPONSE_SIZE_LIMIT).await?;

        let items = body
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .map(|item| SearchResultItem {
                title: item.title,
                url: item.url,
                description: item.description,
                published_date: item.age,
                thumbnail: item.thumbnail.map(|t| t.src),
                meta: serde_json::Value::Null,
            })
            .collect();

        Ok(SearchResponse {
            items,
            provider: "brave".to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        with_backoff(|| self.search_once(query, filters)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_api_key() {
        assert!(BraveProviderBuilder::new().build().is_err());
    }

    #[test]
    fn query_params_pass_freshness_natively() {
        use research_search::Freshness;
        let provider = BraveProviderBuilder::new().api_key("k").build().unwrap();
        let filters = SearchFilters {
            date_range: Some(DateRange::Relative(Freshness::Pm)),
            ..Default::default()
        };
        let params = provider.query_params("q", &filters);
        assert!(params.contains(&("freshness".to_string(), "pm".to_string())));
    }

    #[test]
    fn query_params_fall_back_to_site_operator_for_domains() {
        let provider = BraveProviderBuilder::new().api_key("k").build().unwrap();
        let filters = SearchFilters {
            exclude_domains: vec!["pinterest.com".into()],
            ..Default::default()
        };
        let params = provider.query_params("ai trends", &filters);
        let q = params.iter().find(|(k, _)| k == "q").unwrap();
        assert!(q.1.contains("-site:pinterest.com"));
    }

    #[test]
    fn query_params_compute_offset_in_pages() {
        let provider = BraveProviderBuilder::new().api_key("k").build().unwrap();
        let filters = SearchFilters {
            count: 10,
            offset: 30,
            ..Default::default()
        };
        let params = provider.query_params("q", &filters);
        let offset = params.iter().find(|(k, _)| k == "offset").unwrap();
        assert_eq!(offset.1, "3");
    }

    #[test]
    fn provider_name_is_brave() {
        let provider = BraveProviderBuilder::new().api_key("k").build().unwrap();
        assert_eq!(provider.name(), "brave");
    }
}
