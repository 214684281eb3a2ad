//! `PipelineContext`: the bundle of capabilities every pipeline stage
//! reads from. Plain data in, plain data out on every step so each stage
//! is unit-testable against `research-testing` fakes in isolation.

use std::sync::Arc;

use research_cache::{CacheStore, SearchCache, SemanticDedup};
use research_core::cancel::CancellationToken;
use research_core::config::{CacheConfig, PipelineConfig};
use research_llm::ResearchLlm;
use research_search::SearchProvider;
use research_store::ProjectStore;

#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn ProjectStore>,
    pub search: Arc<dyn SearchProvider>,
    pub llm: Arc<dyn ResearchLlm>,
    pub cache: Arc<CacheStore>,
    pub search_cache: Arc<SearchCache>,
    pub dedup: Arc<SemanticDedup>,
    pub pipeline: PipelineConfig,
    pub cancel: CancellationToken,
}

impl PipelineContext {
    #[must_use]
    pub fn new(
        store: Arc<dyn ProjectStore>,
        search: Arc<dyn SearchProvider>,
        llm: Arc<dyn ResearchLlm>,
        cache: Arc<CacheStore>,
        cache_config: &CacheConfig,
        pipeline: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        let search_cache = Arc::new(SearchCache::new(
            (*cache).clone(),
            cache_config.search_results,
        ));
        let dedup = Arc::new(SemanticDedup::new(
            (*cache).clone(),
            cache_config.semantic_dedup,
        ));
        Self {
            store,
            search,
            llm,
            cache,
            search_cache,
            dedup,
            pipeline,
            cancel,
        }
    }
}
