//! A fake [`ResearchLlm`] whose every method returns a caller-supplied
//! scripted value. Unset methods fall back to a minimal passthrough so a
//! test that only cares about one pipeline stage doesn't have to script
//! the whole interface.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use research_llm::{
    ClusterRequest, CompileReportRequest, CompiledReport, CrossSourceAnalysis, CrossSourceRequest,
    FilterResultsRequest, FilterResultsResponse, GenerateQueriesRequest, GeneratedQuery, LlmError,
    QueryStrategy, RelevancyScore, ResearchLlm, ScoreRelevancyRequest, TopicCluster, TranslateRequest,
};

type Scripted<T> = Arc<Mutex<Option<T>>>;

#[derive(Clone, Default)]
pub struct MockResearchLlm {
    queries: Scripted<Vec<GeneratedQuery>>,
    filter: Scripted<FilterResultsResponse>,
    relevancy: Scripted<Vec<RelevancyScore>>,
    clusters: Scripted<Vec<TopicCluster>>,
    cross_source: Scripted<CrossSourceAnalysis>,
    report: Scripted<CompiledReport>,
    translated_long: Scripted<String>,
    translated_short: Scripted<(String, String)>,
    embedding_dim: usize,
    supports_clustering: bool,
    call_count: Arc<Mutex<usize>>,
}

impl MockResearchLlm {
    #[must_use]
    pub fn new() -> Self {
        Self { embedding_dim: 8, ..Default::default() }
    }

    #[must_use]
    pub fn with_queries(self, queries: Vec<GeneratedQuery>) -> Self {
        *self.queries.lock().unwrap() = Some(queries);
        self
    }

    #[must_use]
    pub fn with_relevancy(self, scores: Vec<RelevancyScore>) -> Self {
        *self.relevancy.lock().unwrap() = Some(scores);
        self
    }

    #[must_use]
    pub fn with_cross_source(self, analysis: CrossSourceAnalysis) -> Self {
        *self.cross_source.lock().unwrap() = Some(analysis);
        self
    }

    #[must_use]
    pub fn with_report(self, report: CompiledReport) -> Self {
        *self.report.lock().unwrap() = Some(report);
        self
    }

    #[must_use]
    pub fn with_clustering_support(mut self) -> Self {
        self.supports_clustering = true;
        self
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    fn record_call(&self) {
        *self.call_count.lock().unwrap() += 1;
    }
}

#[async_trait]
impl ResearchLlm for MockResearchLlm {
    async fn generate_queries(&self, request: GenerateQueriesRequest) -> Result<Vec<GeneratedQuery>, LlmError> {
        self.record_call();
        Ok(self.queries.lock().unwrap().clone().unwrap_or_else(|| {
            (0..request.count)
                .map(|i| GeneratedQuery { query: format!("{} {i}", request.description), strategy: QueryStrategy::Broad })
                .collect()
        }))
    }

    async fn filter_results(&self, request: FilterResultsRequest) -> Result<FilterResultsResponse, LlmError> {
        self.record_call();
        Ok(self.filter.lock().unwrap().clone().unwrap_or_else(|| FilterResultsResponse {
            keep_urls: request.items.into_iter().map(|item| item.url).collect(),
        }))
    }

    async fn score_relevancy(&self, request: ScoreRelevancyRequest) -> Result<Vec<RelevancyScore>, LlmError> {
        self.record_call();
        Ok(self.relevancy.lock().unwrap().clone().unwrap_or_else(|| {
            request.items.into_iter().map(|item| RelevancyScore { url: item.url, score: 80, key_points: Vec::new() }).collect()
        }))
    }

    async fn cluster_by_topic(&self, request: ClusterRequest) -> Result<Vec<TopicCluster>, LlmError> {
        self.record_call();
        Ok(self.clusters.lock().unwrap().clone().unwrap_or_else(|| {
            request
                .items
                .first()
                .map(|item| vec![TopicCluster { topic: "general".into(), primary_url: item.url.clone(), related_urls: Vec::new() }])
                .unwrap_or_default()
        }))
    }

    async fn analyze_cross_source(&self, _request: CrossSourceRequest) -> Result<CrossSourceAnalysis, LlmError> {
        self.record_call();
        Ok(self.cross_source.lock().unwrap().clone().unwrap_or_default())
    }

    async fn compile_report(&self, request: CompileReportRequest) -> Result<CompiledReport, LlmError> {
        self.record_call();
        Ok(self.report.lock().unwrap().clone().unwrap_or_else(|| CompiledReport {
            markdown: format!("# {}\n\n{}", request.description, request.analysis.narrative),
            title: request.description,
            summary: "mock summary".into(),
        }))
    }

    async fn translate_long_form(&self, request: TranslateRequest) -> Result<String, LlmError> {
        self.record_call();
        Ok(self.translated_long.lock().unwrap().clone().unwrap_or(request.text))
    }

    async fn translate_short_form(&self, request: TranslateRequest) -> Result<(String, String), LlmError> {
        self.record_call();
        Ok(self.translated_short.lock().unwrap().clone().unwrap_or((request.text.clone(), request.text)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.record_call();
        let seed = text.bytes().fold(0u32, |acc, b| acc.wrapping_add(u32::from(b)));
        Ok((0..self.embedding_dim).map(|i| ((seed.wrapping_add(i as u32)) % 997) as f32 / 997.0).collect())
    }

    fn supports_clustering(&self) -> bool {
        self.supports_clustering
    }
}
