//! Request/response shapes for `ResearchLlm`, one pair per pipeline need
//! (§4.C/§4.F) rather than a single catch-all "complete" call — each is
//! independently retryable and independently testable against a fake.

use serde::{Deserialize, Serialize};

use research_core::model::SearchParameters;
use research_search::SearchResultItem;

/// §4.F step 2: "diverse queries across strategies {broad, specific,
/// question, temporal}".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStrategy {
    Broad,
    Specific,
    Question,
    Temporal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQueriesRequest {
    pub description: String,
    pub search_parameters: SearchParameters,
    /// ISO date the queries are generated against, so "temporal" queries can
    /// anchor on "this week"/"this month" correctly.
    pub current_date: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuery {
    pub query: String,
    pub strategy: QueryStrategy,
}

/// §4.F step 4: title+snippet only, no fetch yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResultsRequest {
    pub description: String,
    pub items: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResultsResponse {
    /// URLs of items judged worth fetching.
    pub keep_urls: Vec<String>,
}

/// §4.F step 5 output shape (extraction itself is not an LLM call; this
/// type is the input relevancy analysis consumes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedItem {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub published_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRelevancyRequest {
    pub description: String,
    pub items: Vec<ExtractedItem>,
}

/// §4.F step 6: "score each extracted item 0-100... must also produce
/// keyPoints".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevancyScore {
    pub url: String,
    pub score: u8,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    pub items: Vec<RelevancyScore>,
}

/// §4.F step 7: "primary-plus-related structure".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCluster {
    pub topic: String,
    pub primary_url: String,
    pub related_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossSourceRequest {
    pub description: String,
    pub items: Vec<RelevancyScore>,
}

/// §4.F step 8: "themes, connections, contradictions, unique insights,
/// overall narrative".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossSourceAnalysis {
    pub themes: Vec<String>,
    pub connections: Vec<String>,
    pub contradictions: Vec<String>,
    pub unique_insights: Vec<String>,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReportRequest {
    pub description: String,
    pub analysis: CrossSourceAnalysis,
    pub clusters: Option<Vec<TopicCluster>>,
}

/// §4.F step 9: "{markdown, title, summary}... no [n] markers inside body;
/// natural attribution".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledReport {
    pub markdown: String,
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_query_round_trips_through_json() {
        let q = GeneratedQuery {
            query: "ai trends 2025".into(),
            strategy: QueryStrategy::Temporal,
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["strategy"], "temporal");
        let back: GeneratedQuery = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }
}
