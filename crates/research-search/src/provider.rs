//! `SearchProvider` (§4.B): the capability every vendor implementation
//! and the multi-provider orchestrator conform to.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::filters::SearchFilters;
use crate::result::SearchResponse;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable provider name, used in cache fingerprints (§3) and health
    /// tracking (§4.E).
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError>;

    /// Default implementation issues `search` once per query sequentially;
    /// a provider with a native batch endpoint may override this.
    async fn search_multiple(
        &self,
        queries: &[String],
        filters: &SearchFilters,
    ) -> HashMap<String, Result<SearchResponse, SearchError>> {
        let mut results = HashMap::with_capacity(queries.len());
        for query in queries {
            let outcome = self.search(query, filters).await;
            results.insert(query.clone(), outcome);
        }
        results
    }
}
