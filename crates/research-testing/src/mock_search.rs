//! A configurable fake [`SearchProvider`] for pipeline and orchestrator
//! tests: a fixed response or a per-query handler, with call history and a
//! one-shot failure toggle.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use research_search::{SearchError, SearchFilters, SearchProvider, SearchResponse, SearchResultItem};

pub type SearchHandler = Arc<dyn Fn(&str, &SearchFilters) -> Result<SearchResponse, SearchError> + Send + Sync>;

#[derive(Clone)]
pub struct MockSearchProvider {
    name: String,
    handler: Option<SearchHandler>,
    fixed_response: SearchResponse,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
    error_message: String,
}

impl MockSearchProvider {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            fixed_response: SearchResponse { items: Vec::new(), provider: name.clone() },
            name,
            handler: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            error_message: "mock search provider error".to_string(),
        }
    }

    #[must_use]
    pub fn with_items(mut self, items: Vec<SearchResultItem>) -> Self {
        self.fixed_response = SearchResponse { items, provider: self.name.clone() };
        self
    }

    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &SearchFilters) -> Result<SearchResponse, SearchError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Makes the next `search` call return `Err`, then resets.
    pub fn fail_next(&self) {
        *self.should_fail.lock().unwrap() = true;
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<SearchResponse, SearchError> {
        self.call_history.lock().unwrap().push(query.to_string());

        {
            let mut should_fail = self.should_fail.lock().unwrap();
            if *should_fail {
                *should_fail = false;
                return Err(SearchError::Client { status: 500, body: self.error_message.clone() });
            }
        }

        match &self.handler {
            Some(handler) => handler(query, filters),
            None => Ok(self.fixed_response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_response_is_returned_for_any_query() {
        let provider = MockSearchProvider::new("mock").with_items(vec![SearchResultItem {
            title: "t".into(),
            url: "https://example.com".into(),
            description: "d".into(),
            published_date: None,
            thumbnail: None,
            meta: serde_json::Value::Null,
        }]);

        let response = provider.search("anything", &SearchFilters::default()).await.unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn fail_next_triggers_a_single_error() {
        let provider = MockSearchProvider::new("mock");
        provider.fail_next();

        assert!(provider.search("q", &SearchFilters::default()).await.is_err());
        assert!(provider.search("q", &SearchFilters::default()).await.is_ok());
    }

    #[tokio::test]
    async fn handler_receives_the_query_and_filters() {
        let provider = MockSearchProvider::new("mock").with_handler(|query, _filters| {
            Ok(SearchResponse {
                items: vec![SearchResultItem {
                    title: query.to_string(),
                    url: "https://example.com".into(),
                    description: String::new(),
                    published_date: None,
                    thumbnail: None,
                    meta: serde_json::Value::Null,
                }],
                provider: "mock".into(),
            })
        });

        let response = provider.search("rust async traits", &SearchFilters::default()).await.unwrap();
        assert_eq!(response.items[0].title, "rust async traits");
    }
}
