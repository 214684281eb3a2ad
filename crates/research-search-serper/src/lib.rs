//! Serper.dev `SearchProvider` implementation, grounded on the teacher's
//! `dashflow-serper` tool: same builder shape, same HTTP client
//! construction, same size-limited JSON response parsing, adapted from a
//! single-shot agent tool into the research execution core's long-lived
//! capability contract (self-rate-limited, retried, health-trackable).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use research_search::{
    http, json_with_limit, retry::with_backoff, RateLimiter, SearchError, SearchFilters,
    SearchProvider, SearchResponse, SearchResultItem,
};

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
/// §4.B example floor: "≥100 ms for one provider".
const SELF_RATE_LIMIT_FLOOR: Duration = Duration::from_millis(100);

pub struct SerperProvider {
    api_key: String,
    client: reqwest::Client,
    rate_limiter: RateLimiter,
}

pub struct SerperProviderBuilder {
    api_key: Option<String>,
}

impl SerperProviderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { api_key: None }
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn build(self) -> Result<SerperProvider, SearchError> {
        let api_key = self
            .api_key
            .ok_or_else(|| SearchError::Configuration("serper api key is required".into()))?;
        Ok(SerperProvider {
            api_key,
            client: http::build_client(),
            rate_limiter: RateLimiter::new(SELF_RATE_LIMIT_FLOOR),
        })
    }
}

impl Default for SerperProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponseBody {
    #[serde(default)]
    organic: Vec<SerperOrganicResult>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganicResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
    date: Option<String>,
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
}

impl SerperProvider {
    fn request_body(&self, query: &str, filters: &SearchFilters) -> serde_json::Value {
        let augmented_query = filters.apply_domain_operators(query);
        let aligned_offset = filters.aligned_offset();
        let page = if filters.count == 0 {
            1
        } else {
            aligned_offset / filters.count + 1
        };
        let mut body = serde_json::json!({
            "q": augmented_query,
            "num": filters.count,
            "page": page,
        });
        if let Some(country) = &filters.country {
            body["gl"] = serde_json::Value::String(country.clone());
        }
        if let Some(language) = &filters.language {
            body["hl"] = serde_json::Value::String(language.clone());
        }
        if let Some(tbs) = freshness_to_tbs(filters) {
            body["tbs"] = serde_json::Value::String(tbs);
        }
        body
    }

    async fn search_once(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        self.rate_limiter.acquire().await;
        let response = self
            .client
            .post(SERPER_ENDPOINT)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.request_body(query, filters))
            .send()
            .await
            .map_err(SearchError::Request)?;

        let body: SerperResponseBody =
            json_with_limit(response, http::RESPONSE_SIZE_LIMIT).await?;

        Ok(SearchResponse {
            items: body
                .organic
                .into_iter()
                .map(|item| SearchResultItem {
                    title: item.title,
                    url: item.link,
                    description: item.snippet,
                    published_date: item.date,
                    thumbnail: item.image_url,
                    meta: serde_json::Value::Null,
                })
                .collect(),
            provider: "serper".to_string(),
        })
    }
}

fn freshness_to_tbs(filters: &SearchFilters) -> Option<String> {
    use research_search::DateRange;
    match &filters.date_range {
        Some(DateRange::Relative(freshness)) => {
            Some(format!("qdr:{}", &freshness.as_str()[1..]))
        }
        _ => None,
    }
}

#[async_trait]
impl SearchProvider for SerperProvider {
    fn name(&self) -> &str {
        "serper"
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
        let result = SerperProviderBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_succeeds_with_api_key() {
        let provider = SerperProviderBuilder::new().api_key("test-key").build();
        assert!(provider.is_ok());
    }

    #[test]
    fn request_body_encodes_domain_filters_in_query() {
        let provider = SerperProviderBuilder::new().api_key("k").build().unwrap();
        let filters = SearchFilters {
            include_domains: vec!["nytimes.com".into()],
            ..Default::default()
        };
        let body = provider.request_body("ai trends", &filters);
        assert!(body["q"].as_str().unwrap().contains("site:nytimes.com"));
    }

    #[test]
    fn request_body_computes_page_from_aligned_offset() {
        let provider = SerperProviderBuilder::new().api_key("k").build().unwrap();
        let filters = SearchFilters {
            count: 10,
            offset: 20,
            ..Default::default()
        };
        let body = provider.request_body("q", &filters);
        assert_eq!(body["page"], 3);
    }

    #[test]
    fn freshness_maps_to_google_tbs_operator() {
        use research_search::{DateRange, Freshness};
        let filters = SearchFilters {
            date_range: Some(DateRange::Relative(Freshness::Pw)),
            ..Default::default()
        };
        assert_eq!(freshness_to_tbs(&filters), Some("qdr:w".to_string()));
    }

    #[test]
    fn absolute_date_range_has_no_tbs_mapping() {
        use research_search::DateRange;
        let filters = SearchFilters {
            date_range: Some(DateRange::Absolute {
                date_from: "2025-01-01".into(),
                date_to: "2025-02-01".into(),
            }),
            ..Default::default()
        };
        assert_eq!(freshness_to_tbs(&filters), None);
    }

    #[test]
    fn provider_name_is_serper() {
        let provider = SerperProviderBuilder::new().api_key("k").build().unwrap();
        assert_eq!(provider.name(), "serper");
    }
}
