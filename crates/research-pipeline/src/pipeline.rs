//! The Research Pipeline (§4.F): eleven steps from a project description
//! to a persisted `pending` delivery log, run as private async functions
//! on [`PipelineContext`] taking and returning plain data so each step is
//! unit-testable against `research-testing` fakes without a live provider.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;

use research_cache::DedupOutcome;
use research_core::model::{
    DeliveryLog, DeliveryLogId, DeliveryStats, DeliveryStatus, Project, ProjectId, ProjectStatus,
    SearchParameters, UserId,
};
use research_llm::{
    ClusterRequest, CompileReportRequest, CompiledReport, CrossSourceAnalysis, CrossSourceRequest,
    ExtractedItem, FilterResultsRequest, GenerateQueriesRequest, GeneratedQuery,
    RelevancyScore, ScoreRelevancyRequest, TopicCluster, TranslateRequest,
};
use research_search::{DateRange, Freshness, SearchFilters, SearchResponse, SearchResultItem};

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::render::validate_report_contract;

const EXTRACTION_CONCURRENCY: usize = 8;
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of one pipeline run. A skip is not an error: the project may
/// have gone missing, paused, or deleted out from under an already
/// dequeued job, which is an expected race rather than a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed {
        delivery_log_id: DeliveryLogId,
        duration_ms: u64,
        stats: DeliveryStats,
    },
    Skipped {
        reason: String,
    },
}

impl PipelineOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        PipelineOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

struct ResearchBody {
    report: CompiledReport,
    stats: DeliveryStats,
}

/// §4.F, steps 1 and 11. Steps 2-9 run as [`run_research_body`], retried
/// as a unit; step 10 translates the result; step 11 persists it after a
/// fresh staleness check.
pub async fn run_pipeline(
    ctx: &PipelineContext,
    user_id: UserId,
    project_id: ProjectId,
) -> Result<PipelineOutcome, PipelineError> {
    let Some(project) = ctx.store.get_project(user_id, project_id).await? else {
        return Ok(PipelineOutcome::skipped("project not found"));
    };
    if is_unrunnable(&project) {
        return Ok(PipelineOutcome::skipped(
            "project is paused or deleted",
        ));
    }

    let started = Instant::now();
    let body =
        research_search::retry::with_backoff(|| run_research_body(ctx, &project)).await?;
    let (title, summary, markdown) = translate_if_needed(ctx, &project, body.report).await?;

    // Re-read before persisting: the project may have been paused or
    // deleted while research was in flight.
    let Some(current) = ctx.store.get_project(user_id, project_id).await? else {
        return Ok(PipelineOutcome::skipped(
            "project deleted during research",
        ));
    };
    if is_unrunnable(&current) {
        return Ok(PipelineOutcome::skipped(
            "project was paused or deleted during research",
        ));
    }

    let log = DeliveryLog {
        id: DeliveryLogId::new(),
        project_id,
        status: DeliveryStatus::Pending,
        report_title: title,
        report_markdown: markdown,
        report_summary: summary,
        delivered_at: None,
        retry_count: 0,
        stats: body.stats,
        error: None,
    };
    ctx.store.put_delivery_log(&log).await?;

    Ok(PipelineOutcome::Completed {
        delivery_log_id: log.id,
        duration_ms: started.elapsed().as_millis() as u64,
        stats: log.stats,
    })
}

fn is_unrunnable(project: &Project) -> bool {
    matches!(project.status, ProjectStatus::Paused | ProjectStatus::Deleted)
}

async fn run_research_body(
    ctx: &PipelineContext,
    project: &Project,
) -> Result<ResearchBody, PipelineError> {
    let mut stats = DeliveryStats::default();

    let t = Instant::now();
    let queries = ctx.generate_queries(project).await?;
    stats.query_generation_ms = t.elapsed().as_millis() as u64;
    stats.queries_issued = queries.len() as u32;

    ctx.cancel.check()?;
    let filters = build_filters(&project.search_parameters, ctx.pipeline.results_per_query);
    let t = Instant::now();
    let raw_items = ctx.search_all_queries(&queries, &filters).await?;
    stats.search_ms = t.elapsed().as_millis() as u64;
    stats.results_found = raw_items.len() as u32;

    let kept_items = ctx.filter_results(project, raw_items).await;

    ctx.cancel.check()?;
    let t = Instant::now();
    let extracted = ctx.extract_content(&kept_items).await;
    stats.extraction_ms = t.elapsed().as_millis() as u64;

    ctx.cancel.check()?;
    let t = Instant::now();
    let mut scores = ctx.score_relevancy(project, extracted).await?;
    stats.relevancy_ms = t.elapsed().as_millis() as u64;
    stats.results_relevant = scores.len() as u32;

    if (scores.len() as u32) < ctx.pipeline.min_results {
        tracing::warn!(
            found = scores.len(),
            min_results = ctx.pipeline.min_results,
            "fewer relevant results than the configured minimum; proceeding with what was found"
        );
    }
    scores.truncate(ctx.pipeline.max_results as usize);

    let clusters = ctx.cluster_if_supported(&scores).await;

    ctx.cancel.check()?;
    let t = Instant::now();
    let analysis = ctx.analyze_cross_source(project, scores).await?;
    stats.analysis_ms = t.elapsed().as_millis() as u64;

    ctx.cancel.check()?;
    let t = Instant::now();
    let report = ctx.compile_report(project, analysis, clusters).await?;
    stats.compilation_ms = t.elapsed().as_millis() as u64;

    Ok(ResearchBody { report, stats })
}

/// §4.F step 2 → `SearchFilters` translation: `priorityDomains`/
/// `excludedDomains` become include/exclude domain lists, `region` becomes
/// `country`, and `dateRangePreference` maps onto a relative freshness
/// window when it names one of the four recognized codes.
fn build_filters(params: &SearchParameters, count: u32) -> SearchFilters {
    let date_range = params
        .date_range_preference
        .as_deref()
        .and_then(|pref| match pref {
            "pd" => Some(DateRange::Relative(Freshness::Pd)),
            "pw" => Some(DateRange::Relative(Freshness::Pw)),
            "pm" => Some(DateRange::Relative(Freshness::Pm)),
            "py" => Some(DateRange::Relative(Freshness::Py)),
            _ => None,
        });
    SearchFilters {
        count,
        offset: 0,
        date_range,
        country: params.region.clone(),
        language: params.language.clone(),
        safesearch: None,
        include_domains: params.priority_domains.clone(),
        exclude_domains: params.excluded_domains.clone(),
    }
}

impl PipelineContext {
    /// §4.F step 2: diverse queries across {broad, specific, question,
    /// temporal} strategies.
    async fn generate_queries(&self, project: &Project) -> Result<Vec<GeneratedQuery>, PipelineError> {
        let request = GenerateQueriesRequest {
            description: project.description.clone(),
            search_parameters: project.search_parameters.clone(),
            current_date: chrono::Utc::now().date_naive().to_string(),
            count: self.pipeline.queries_per_iteration,
        };
        let queries = research_search::retry::with_backoff(|| {
            let request = request.clone();
            async move { self.llm.generate_queries(request).await }
        })
        .await?;
        Ok(queries)
    }

    /// §4.F step 3: cache, then semantic dedup, then a live call through
    /// the multi-provider orchestrator, for every generated query.
    async fn search_all_queries(
        &self,
        queries: &[GeneratedQuery],
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResultItem>, PipelineError> {
        let mut items = Vec::new();
        for query in queries {
            self.cancel.check()?;
            let response = self.search_one(&query.query, filters).await?;
            items.extend(response.items);
        }
        Ok(items)
    }

    async fn search_one(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, PipelineError> {
        if let Some(cached) = self.search_cache.get(query, filters, self.search.name()).await {
            return Ok(cached);
        }

        let embedding = self.llm.embed(query).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "embedding failed; semantic dedup will miss for this query");
            Vec::new()
        });
        let dedup_outcome = self
            .dedup
            .check_and_record(query, filters, self.search.name(), embedding)
            .await;
        if let DedupOutcome::Hit { cache_key } = dedup_outcome {
            if let Some(cached) = self.search_cache.get_by_cache_key(&cache_key).await {
                return Ok(cached);
            }
        }

        let augmented_query = filters.apply_domain_operators(query);
        let response = self.search.search(&augmented_query, filters).await?;
        self.search_cache.set(query, filters, self.search.name(), &response).await;
        Ok(response)
    }

    /// §4.F step 4: best-effort title+snippet filtering; keep everything
    /// if the call fails.
    async fn filter_results(
        &self,
        project: &Project,
        items: Vec<SearchResultItem>,
    ) -> Vec<SearchResultItem> {
        if items.is_empty() {
            return items;
        }
        let request = FilterResultsRequest {
            description: project.description.clone(),
            items: items.clone(),
        };
        match self.llm.filter_results(request).await {
            Ok(response) => {
                let keep: std::collections::HashSet<String> = response.keep_urls.into_iter().collect();
                items.into_iter().filter(|item| keep.contains(&item.url)).collect()
            }
            Err(err) => {
                tracing::warn!(error = %err, "result filtering failed; keeping all results");
                items
            }
        }
    }

    /// §4.F step 5: bounded-concurrency fetch with a per-request timeout;
    /// an item that fails to fetch is dropped rather than failing the run.
    async fn extract_content(&self, items: &[SearchResultItem]) -> Vec<ExtractedItem> {
        let client = research_search::http::build_client();
        let semaphore = Arc::new(Semaphore::new(EXTRACTION_CONCURRENCY));

        let fetches = items.iter().cloned().map(|item| {
            let client = client.clone();
            let semaphore = semaphore.clone();
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };
                let fetch = tokio::time::timeout(EXTRACTION_TIMEOUT, client.get(&item.url).send());
                match fetch.await {
                    Ok(Ok(response)) if response.status().is_success() => Some(ExtractedItem {
                        url: item.url,
                        title: item.title,
                        snippet: item.description,
                        published_date: item.published_date,
                    }),
                    Ok(Ok(response)) => {
                        tracing::debug!(url = %item.url, status = %response.status(), "dropping unfetchable item");
                        None
                    }
                    Ok(Err(err)) => {
                        tracing::debug!(url = %item.url, error = %err, "dropping item after fetch error");
                        None
                    }
                    Err(_) => {
                        tracing::debug!(url = %item.url, "dropping item after extraction timeout");
                        None
                    }
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// §4.F step 6: batched 0-100 relevancy scoring with key points,
    /// retried on a malformed response, then thresholded.
    async fn score_relevancy(
        &self,
        project: &Project,
        items: Vec<ExtractedItem>,
    ) -> Result<Vec<RelevancyScore>, PipelineError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let request = ScoreRelevancyRequest {
            description: project.description.clone(),
            items,
        };
        let scores = research_search::retry::with_backoff(|| {
            let request = request.clone();
            async move { self.llm.score_relevancy(request).await }
        })
        .await?;
        Ok(scores
            .into_iter()
            .filter(|score| u32::from(score.score) >= u32::from(self.pipeline.relevancy_threshold))
            .collect())
    }

    /// §4.F step 7: optional, gated on the capability probe — absent a
    /// clustering-capable LLM, the pipeline proceeds unclustered.
    async fn cluster_if_supported(&self, scores: &[RelevancyScore]) -> Option<Vec<TopicCluster>> {
        if !self.llm.supports_clustering() || scores.is_empty() {
            return None;
        }
        match self
            .llm
            .cluster_by_topic(ClusterRequest { items: scores.to_vec() })
            .await
        {
            Ok(clusters) => Some(clusters),
            Err(err) => {
                tracing::warn!(error = %err, "clustering failed; proceeding without clusters");
                None
            }
        }
    }

    /// §4.F step 8: themes, connections, contradictions, unique insights,
    /// overall narrative.
    async fn analyze_cross_source(
        &self,
        project: &Project,
        scores: Vec<RelevancyScore>,
    ) -> Result<CrossSourceAnalysis, PipelineError> {
        let request = CrossSourceRequest {
            description: project.description.clone(),
            items: scores,
        };
        Ok(self.llm.analyze_cross_source(request).await?)
    }

    /// §4.F step 9: compile to the fixed `{markdown, title, summary}`
    /// contract and verify it before returning.
    async fn compile_report(
        &self,
        project: &Project,
        analysis: CrossSourceAnalysis,
        clusters: Option<Vec<TopicCluster>>,
    ) -> Result<CompiledReport, PipelineError> {
        let request = CompileReportRequest {
            description: project.description.clone(),
            analysis,
            clusters: clusters.clone(),
        };
        let report = if clusters.is_some() {
            self.llm.compile_clustered_report(request).await?
        } else {
            self.llm.compile_report(request).await?
        };
        validate_report_contract(&report.markdown)?;
        Ok(report)
    }
}

/// §4.F step 10: translate only when `outputLanguage` names something
/// other than the search language, and only after the whitelist check the
/// LLM implementation itself enforces.
async fn translate_if_needed(
    ctx: &PipelineContext,
    project: &Project,
    report: CompiledReport,
) -> Result<(String, String, String), PipelineError> {
    let search_language = project.search_parameters.language.as_deref().unwrap_or("en");
    let Some(output_language) = project.search_parameters.output_language.as_deref() else {
        return Ok((report.title, report.summary, report.markdown));
    };
    if output_language == search_language {
        return Ok((report.title, report.summary, report.markdown));
    }

    let markdown = ctx
        .llm
        .translate_long_form(TranslateRequest {
            text: report.markdown,
            target_language: output_language.to_string(),
        })
        .await?;
    let (title, summary) = ctx
        .llm
        .translate_short_form(TranslateRequest {
            text: format!("{}\n{}", report.title, report.summary),
            target_language: output_language.to_string(),
        })
        .await?;
    Ok((title, summary, markdown))
}
