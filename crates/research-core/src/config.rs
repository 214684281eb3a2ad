//! Configuration (§6). Loaded layered: built-in defaults → optional TOML
//! file → environment variable overrides (secrets and endpoints only, per
//! §6.2), mirroring `dashflow`'s own config-loader layering.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// `search.provider` selection (§6, §9 "capability with tagged variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    Serper,
    Brave,
    Multi,
}

/// `cache.*` options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub search_results: SearchCacheTuning,
    #[serde(default)]
    pub semantic_dedup: SemanticDedupTuning,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis: RedisConfig::default(),
            search_results: SearchCacheTuning::default(),
            semantic_dedup: SemanticDedupTuning::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

/// §4.D cache TTL/popularity tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchCacheTuning {
    pub base_ttl_secs: u64,
    pub popular_ttl_secs: u64,
    /// Jitter fraction `j` in `ttl · (1 + U[0, j])`.
    pub ttl_jitter: f64,
    pub popular_threshold: u64,
}

impl Default for SearchCacheTuning {
    fn default() -> Self {
        Self {
            base_ttl_secs: 3600,
            popular_ttl_secs: 21_600,
            ttl_jitter: 0.1,
            popular_threshold: 5,
        }
    }
}

/// §4.D semantic dedup tuning: the recency window embeddings are compared
/// within, and the cosine-similarity threshold a match must clear.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SemanticDedupTuning {
    pub window_hours: u64,
    pub similarity_threshold: f32,
}

impl Default for SemanticDedupTuning {
    fn default() -> Self {
        Self {
            window_hours: 24,
            similarity_threshold: 0.85,
        }
    }
}

/// One entry of `models.*` (§6): `{model, temperature, responseFormat}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

/// `models.*` (§6): one config per pipeline stage that calls the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelsConfig {
    pub query_generation: ModelConfig,
    pub search_filtering: ModelConfig,
    pub relevancy_analysis: ModelConfig,
    pub cross_source_analysis: ModelConfig,
    pub report_compilation: ModelConfig,
    pub report_summary: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let balanced = |model: &str| ModelConfig {
            model: model.to_string(),
            temperature: 0.3,
            response_format: ResponseFormat::JsonObject,
        };
        Self {
            query_generation: balanced("gpt-4o-mini"),
            search_filtering: balanced("gpt-4o-mini"),
            relevancy_analysis: balanced("gpt-4o-mini"),
            cross_source_analysis: balanced("gpt-4o"),
            report_compilation: ModelConfig {
                model: "gpt-4o".into(),
                temperature: 0.5,
                response_format: ResponseFormat::Text,
            },
            report_summary: balanced("gpt-4o-mini"),
        }
    }
}

/// Pipeline knobs (§6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineConfig {
    pub max_iterations: u32,
    pub queries_per_iteration: u32,
    pub results_per_query: u32,
    pub relevancy_threshold: u8,
    pub min_results: u32,
    pub max_results: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            queries_per_iteration: 4,
            results_per_query: 10,
            relevancy_threshold: 60,
            min_results: 3,
            max_results: 40,
        }
    }
}

/// Top-level configuration record (§6). Unknown top-level keys are
/// rejected so a typo in the config file fails at startup, not silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub search_provider: SearchProviderKind,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_provider: SearchProviderKind::Serper,
            cache: CacheConfig::default(),
            models: ModelsConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Loads defaults, then overlays a TOML file if `path` exists. Environment
    /// overrides (secrets, feature flags, scheduler tuning) are read
    /// separately via [`env`] at the point of use, since they name
    /// endpoints/credentials rather than shaping this struct's fields.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

fn default_true() -> bool {
    true
}

/// Environment variable accessors (§6.2). Secrets and endpoints only; all
/// other tuning lives in [`Config`].
pub mod env {
    pub const LLM_API_KEY: &str = "RESEARCH_LLM_API_KEY";
    pub const SEARCH_SERPER_API_KEY: &str = "RESEARCH_SEARCH_SERPER_API_KEY";
    pub const SEARCH_BRAVE_API_KEY: &str = "RESEARCH_SEARCH_BRAVE_API_KEY";
    pub const EMAIL_API_KEY: &str = "RESEARCH_EMAIL_API_KEY";
    pub const EMAIL_FROM_ADDRESS: &str = "RESEARCH_EMAIL_FROM_ADDRESS";
    pub const EMAIL_ENDPOINT: &str = "RESEARCH_EMAIL_ENDPOINT";
    pub const STORE_DATABASE_URL: &str = "RESEARCH_STORE_DATABASE_URL";
    pub const CACHE_REDIS_HOST: &str = "RESEARCH_CACHE_REDIS_HOST";
    pub const CACHE_REDIS_PORT: &str = "RESEARCH_CACHE_REDIS_PORT";
    pub const CACHE_REDIS_PASSWORD: &str = "RESEARCH_CACHE_REDIS_PASSWORD";
    pub const ENABLE_SEARCH_CACHE: &str = "ENABLE_SEARCH_CACHE";
    pub const ENABLE_SEMANTIC_DEDUP: &str = "ENABLE_SEMANTIC_DEDUP";
    pub const ENABLE_MULTI_PROVIDER: &str = "ENABLE_MULTI_PROVIDER";
    pub const SCHEDULER_CHECK_WINDOW_MINUTES: &str = "SCHEDULER_CHECK_WINDOW_MINUTES";
    pub const SCHEDULER_ENABLED: &str = "SCHEDULER_ENABLED";
    pub const RUN_ON_STARTUP: &str = "RUN_ON_STARTUP";

    #[must_use]
    pub fn is_set(name: &str) -> bool {
        std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
    }

    #[must_use]
    pub fn string_or_default(name: &str, default: &str) -> String {
        std::env::var(name).unwrap_or_else(|_| default.to_string())
    }

    #[must_use]
    pub fn bool_or_default(name: &str, default: bool) -> bool {
        match std::env::var(name) {
            Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => default,
        }
    }

    #[must_use]
    pub fn u64_or_default(name: &str, default: u64) -> u64 {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_self_consistent() {
        let config = Config::default();
        assert_eq!(config.search_provider, SearchProviderKind::Serper);
        assert!(config.cache.enabled);
        assert_eq!(config.pipeline.relevancy_threshold, 60);
    }

    #[test]
    fn load_falls_back_to_defaults_for_missing_file() {
        let config = Config::load("/nonexistent/path/research.toml").unwrap();
        assert_eq!(config.search_provider, SearchProviderKind::Serper);
    }

    #[test]
    fn load_parses_toml_overrides() {
        let dir = std::env::temp_dir().join(format!("research-core-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("research.toml");
        std::fs::write(
            &path,
            r#"
            searchProvider = "brave"

            [pipeline]
            maxIterations = 2
            queriesPerIteration = 6
            resultsPerQuery = 10
            relevancyThreshold = 70
            minResults = 5
            maxResults = 50
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.search_provider, SearchProviderKind::Brave);
        assert_eq!(config.pipeline.relevancy_threshold, 70);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unknown_top_level_field_is_rejected() {
        let result: Result<Config, _> = toml::from_str("searchProvider = \"serper\"\nbogus = 1");
        assert!(result.is_err());
    }

    #[test]
    fn env_bool_or_default_parses_truthy_values() {
        std::env::set_var("RESEARCH_CORE_TEST_FLAG", "true");
        assert!(env::bool_or_default("RESEARCH_CORE_TEST_FLAG", false));
        std::env::remove_var("RESEARCH_CORE_TEST_FLAG");
        assert!(!env::bool_or_default("RESEARCH_CORE_TEST_FLAG", false));
    }
}
