//! `OpenAiLlm`: the one concrete `ResearchLlm`, built the way
//! `dashflow-openai` wraps `async-openai` — per-call temperature/model taken
//! from the relevant `ModelConfig`, JSON-mode requested via
//! `response_format: json_object`, and parse failures mapped to
//! `LlmError::ParseFailure` rather than a generic transport error.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, ResponseFormat as OpenAiResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use research_core::config::{ModelConfig, ModelsConfig, ResponseFormat};

use crate::error::LlmError;
use crate::provider::{ResearchLlm, Result};
use crate::types::*;

/// Whitelisted translation targets (§4.F step 10: "language codes must be
/// whitelisted; unknown codes fail fast before any LLM call").
const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "ja", "zh", "ko", "ru", "ar", "hi",
];

pub struct OpenAiLlm {
    client: Client<OpenAIConfig>,
    models: ModelsConfig,
    embedding_model: String,
}

impl OpenAiLlm {
    #[must_use]
    pub fn new(api_key: impl Into<String>, models: ModelsConfig) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self {
            client: Client::with_config(config),
            models,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// One chat-completion round trip with the given stage's model config,
    /// decoded as `T`. A malformed or non-JSON response becomes
    /// `LlmError::ParseFailure` so the pipeline's fresh-prompt retry (§7)
    /// can target it.
    async fn complete_json<T: DeserializeOwned>(
        &self,
        model_config: &ModelConfig,
        system: &str,
        user: &str,
    ) -> Result<T> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(|e| LlmError::ParseFailure(format!("failed to build system message: {e}")))?;
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(user)
            .build()
            .map_err(|e| LlmError::ParseFailure(format!("failed to build user message: {e}")))?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&model_config.model)
            .temperature(model_config.temperature)
            .messages(vec![system_message.into(), user_message.into()]);
        if model_config.response_format == ResponseFormat::JsonObject {
            builder.response_format(OpenAiResponseFormat::JsonObject);
        }
        let request = builder
            .build()
            .map_err(|e| LlmError::ParseFailure(format!("failed to build request: {e}")))?;

        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::ParseFailure("empty completion response".to_string()))?;

        serde_json::from_str(&content)
            .map_err(|e| LlmError::ParseFailure(format!("{e}: {content}")))
    }
}

#[async_trait]
impl ResearchLlm for OpenAiLlm {
    async fn generate_queries(
        &self,
        request: GenerateQueriesRequest,
    ) -> Result<Vec<GeneratedQuery>> {
        let system = "Generate diverse web search queries across the strategies broad, \
            specific, question, and temporal. Respond with JSON: {\"queries\": \
            [{\"query\": string, \"strategy\": \"broad\"|\"specific\"|\"question\"|\"temporal\"}]}";
        let user = format!(
            "Description: {}\nCurrent date: {}\nCount: {}\nSearch parameters: {}",
            request.description,
            request.current_date,
            request.count,
            serde_json::to_string(&request.search_parameters).unwrap_or_default(),
        );
        #[derive(serde::Deserialize)]
        struct Wrapper {
            queries: Vec<GeneratedQuery>,
        }
        let wrapper: Wrapper = self
            .complete_json(&self.models.query_generation, system, &user)
            .await?;
        Ok(wrapper.queries)
    }

    async fn filter_results(
        &self,
        request: FilterResultsRequest,
    ) -> Result<FilterResultsResponse> {
        let system = "Given a research description and a list of search results (title, url, \
            description only), return the URLs worth investigating further. Respond with JSON: \
            {\"keepUrls\": [string]}";
        let user = format!(
            "Description: {}\nResults: {}",
            request.description,
            serde_json::to_string(&request.items).unwrap_or_default(),
        );
        self.complete_json(&self.models.search_filtering, system, &user)
            .await
    }

    async fn score_relevancy(
        &self,
        request: ScoreRelevancyRequest,
    ) -> Result<Vec<RelevancyScore>> {
        let system = "Score each extracted item 0-100 for relevancy to the description and list \
            its key points. Respond with JSON: {\"scores\": [{\"url\": string, \"score\": \
            integer, \"keyPoints\": [string]}]}";
        let user = format!(
            "Description: {}\nItems: {}",
            request.description,
            serde_json::to_string(&request.items).unwrap_or_default(),
        );
        #[derive(serde::Deserialize)]
        struct Wrapper {
            scores: Vec<RelevancyScore>,
        }
        let wrapper: Wrapper = self
            .complete_json(&self.models.relevancy_analysis, system, &user)
            .await?;
        Ok(wrapper.scores)
    }

    async fn cluster_by_topic(&self, request: ClusterRequest) -> Result<Vec<TopicCluster>> {
        let system = "Group these relevant items into topic clusters, each with one primary url \
            and a list of related urls. Respond with JSON: {\"clusters\": [{\"topic\": string, \
            \"primaryUrl\": string, \"relatedUrls\": [string]}]}";
        let user = serde_json::to_string(&request.items).unwrap_or_default();
        #[derive(serde::Deserialize)]
        struct Wrapper {
            clusters: Vec<TopicCluster>,
        }
        let wrapper: Wrapper = self
            .complete_json(&self.models.relevancy_analysis, system, &user)
            .await?;
        Ok(wrapper.clusters)
    }

    async fn analyze_cross_source(
        &self,
        request: CrossSourceRequest,
    ) -> Result<CrossSourceAnalysis> {
        let system = "Analyze these relevant items as a set: identify themes, connections, \
            contradictions, unique insights, and an overall narrative. Respond with JSON: \
            {\"themes\": [string], \"connections\": [string], \"contradictions\": [string], \
            \"uniqueInsights\": [string], \"narrative\": string}";
        let user = format!(
            "Description: {}\nItems: {}",
            request.description,
            serde_json::to_string(&request.items).unwrap_or_default(),
        );
        self.complete_json(&self.models.cross_source_analysis, system, &user)
            .await
    }

    async fn compile_report(&self, request: CompileReportRequest) -> Result<CompiledReport> {
        let system = "Compile a research report from the provided analysis. Output sections, a \
            references list, natural in-text attribution, and never bracket-citation markers \
            like [1] in the body. Respond with JSON: {\"markdown\": string, \"title\": string, \
            \"summary\": string}";
        let user = format!(
            "Description: {}\nAnalysis: {}\nClusters: {}",
            request.description,
            serde_json::to_string(&request.analysis).unwrap_or_default(),
            serde_json::to_string(&request.clusters).unwrap_or_default(),
        );
        self.complete_json(&self.models.report_compilation, system, &user)
            .await
    }

    async fn translate_long_form(&self, request: TranslateRequest) -> Result<String> {
        if !SUPPORTED_LANGUAGES.contains(&request.target_language.as_str()) {
            return Err(LlmError::UnsupportedLanguage(request.target_language));
        }
        let system = format!(
            "Translate the following markdown document into {}. Preserve structure and \
            formatting. Respond with JSON: {{\"text\": string}}",
            request.target_language
        );
        #[derive(serde::Deserialize)]
        struct Wrapper {
            text: String,
        }
        let wrapper: Wrapper = self
            .complete_json(&self.models.report_compilation, &system, &request.text)
            .await?;
        Ok(wrapper.text)
    }

    async fn translate_short_form(
        &self,
        request: TranslateRequest,
    ) -> Result<(String, String)> {
        if !SUPPORTED_LANGUAGES.contains(&request.target_language.as_str()) {
            return Err(LlmError::UnsupportedLanguage(request.target_language));
        }
        let system = format!(
            "Translate this report title and summary into {} with a tight token budget. \
            Respond with JSON: {{\"title\": string, \"summary\": string}}",
            request.target_language
        );
        #[derive(serde::Deserialize)]
        struct Wrapper {
            title: String,
            summary: String,
        }
        let wrapper: Wrapper = self
            .complete_json(&self.models.report_summary, &system, &request.text)
            .await?;
        Ok((wrapper.title, wrapper.summary))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(text)
            .build()
            .map_err(|e| LlmError::ParseFailure(format!("failed to build embedding request: {e}")))?;
        let response = self.client.embeddings().create(request).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::ParseFailure("no embedding returned".to_string()))
    }

    // supports_clustering intentionally left at the trait default (false):
    // cluster_by_topic/compile_clustered_report are implemented above but
    // not yet enabled by default in this port (DESIGN.md Open Question 3).
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_languages_excludes_made_up_codes() {
        assert!(!SUPPORTED_LANGUAGES.contains(&"xx"));
        assert!(SUPPORTED_LANGUAGES.contains(&"es"));
    }
}
