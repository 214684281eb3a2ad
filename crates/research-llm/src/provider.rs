//! `ResearchLlm` (§4.C): one method per pipeline need, each independently
//! retryable, mirroring the shape `dashflow::core::language_models::ChatModel`
//! gives its own capability surface.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{
    ClusterRequest, CompileReportRequest, CompiledReport, CrossSourceAnalysis, CrossSourceRequest,
    FilterResultsRequest, FilterResultsResponse, GenerateQueriesRequest, GeneratedQuery,
    RelevancyScore, ScoreRelevancyRequest, TopicCluster, TranslateRequest,
};

pub type Result<T> = std::result::Result<T, LlmError>;

#[async_trait]
pub trait ResearchLlm: Send + Sync {
    async fn generate_queries(
        &self,
        request: GenerateQueriesRequest,
    ) -> Result<Vec<GeneratedQuery>>;

    async fn filter_results(
        &self,
        request: FilterResultsRequest,
    ) -> Result<FilterResultsResponse>;

    async fn score_relevancy(
        &self,
        request: ScoreRelevancyRequest,
    ) -> Result<Vec<RelevancyScore>>;

    async fn cluster_by_topic(&self, request: ClusterRequest) -> Result<Vec<TopicCluster>>;

    async fn analyze_cross_source(
        &self,
        request: CrossSourceRequest,
    ) -> Result<CrossSourceAnalysis>;

    async fn compile_report(&self, request: CompileReportRequest) -> Result<CompiledReport>;

    async fn compile_clustered_report(
        &self,
        request: CompileReportRequest,
    ) -> Result<CompiledReport> {
        self.compile_report(request).await
    }

    async fn translate_long_form(&self, request: TranslateRequest) -> Result<String>;

    /// Title/summary pair translated separately, "a tight token cap" per
    /// §4.F step 10 — kept as its own call so the prompt budget for a title
    /// isn't shared with the long-form body's.
    async fn translate_short_form(
        &self,
        request: TranslateRequest,
    ) -> Result<(String, String)>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// §9 capability probe: false until both `cluster_by_topic` and
    /// `compile_clustered_report` are meaningfully implemented.
    fn supports_clustering(&self) -> bool {
        false
    }
}
