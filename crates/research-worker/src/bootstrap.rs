//! Shared startup plumbing every binary in this crate needs: load
//! [`research_core::config::Config`], connect the store/cache/queue, pick
//! a search provider, and assemble a [`research_scheduler::WorkerContext`].
//! Grounded on `dashflow-cli/src/main.rs`'s single `#[tokio::main]`
//! entrypoint returning `anyhow::Result<()>`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use research_cache::CacheStore;
use research_core::cancel::CancellationToken;
use research_core::config::{env, Config, SearchProviderKind};
use research_email::{HttpEmailSenderBuilder, RateLimiter as EmailRateLimiter, DELIVERY_RATE_LIMIT_FLOOR};
use research_llm::OpenAiLlm;
use research_pipeline::PipelineContext;
use research_queue::{JobQueue, RedisQueue};
use research_scheduler::WorkerContext;
use research_search::{MultiProvider, MultiProviderConfig, SearchProvider};
use research_search_brave::BraveProviderBuilder;
use research_search_serper::SerperProviderBuilder;
use research_store::{PostgresProjectStore, ProjectStore};

/// Flags/env shared by every binary. Config-file path and Redis key prefix
/// are flags; everything secret or endpoint-shaped comes from `env` (§6.2).
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the optional `research.toml` overlay.
    #[arg(long, default_value = "research.toml")]
    pub config_path: String,

    /// Redis key prefix for the job queue.
    #[arg(long, default_value = "research")]
    pub queue_prefix: String,
}

/// Everything a worker binary shares: the capability bundle, a handle to
/// the cache store for heartbeats/health, and the Prometheus registry.
pub struct Bootstrap {
    pub worker: WorkerContext,
    pub cache: CacheStore,
    pub metrics: Arc<research_observability::ResearchMetrics>,
}

pub async fn bootstrap(args: &CommonArgs) -> Result<Bootstrap> {
    let config = Config::load(&args.config_path).context("loading research.toml")?;

    let cache = CacheStore::connect(&config.cache.redis).await.context("connecting cache store")?;

    let database_url = require_env(env::STORE_DATABASE_URL)?;
    let store: Arc<dyn ProjectStore> =
        Arc::new(PostgresProjectStore::new(&database_url).await.context("connecting project store")?);

    let redis_url = redis_url_from(&config.cache.redis);
    let queue: Arc<dyn JobQueue> =
        Arc::new(RedisQueue::with_key_prefix(&redis_url, &args.queue_prefix, 86_400).await.context("connecting job queue")?);

    let search = build_search_provider(&config)?;

    let llm_api_key = require_env(env::LLM_API_KEY)?;
    let llm: Arc<dyn research_llm::ResearchLlm> = Arc::new(OpenAiLlm::new(llm_api_key, config.models.clone()));

    let email_endpoint = require_env(env::EMAIL_ENDPOINT)?;
    let email_api_key = require_env(env::EMAIL_API_KEY)?;
    let email_from = require_env(env::EMAIL_FROM_ADDRESS)?;
    let email = HttpEmailSenderBuilder::new()
        .endpoint(email_endpoint)
        .api_key(email_api_key)
        .from_address(email_from)
        .build()
        .context("building email sender")?;

    let cache_arc = Arc::new(cache.clone());
    let pipeline_ctx = PipelineContext::new(
        store,
        search,
        llm,
        cache_arc,
        &config.cache,
        config.pipeline,
        CancellationToken::new(),
    );

    let worker = WorkerContext {
        pipeline: pipeline_ctx,
        queue,
        email: Arc::new(email),
        delivery_rate_limiter: Arc::new(EmailRateLimiter::new(DELIVERY_RATE_LIMIT_FLOOR)),
    };

    let metrics = Arc::new(research_observability::ResearchMetrics::new().context("registering metrics")?);

    Ok(Bootstrap { worker, cache, metrics })
}

fn build_search_provider(config: &Config) -> Result<Arc<dyn SearchProvider>> {
    match config.search_provider {
        SearchProviderKind::Serper => {
            let api_key = require_env(env::SEARCH_SERPER_API_KEY)?;
            let provider = SerperProviderBuilder::new().api_key(api_key).build().context("building serper provider")?;
            Ok(Arc::new(provider))
        }
        SearchProviderKind::Brave => {
            let api_key = require_env(env::SEARCH_BRAVE_API_KEY)?;
            let provider = BraveProviderBuilder::new().api_key(api_key).build().context("building brave provider")?;
            Ok(Arc::new(provider))
        }
        SearchProviderKind::Multi => {
            let mut providers: Vec<(String, Arc<dyn SearchProvider>)> = Vec::new();
            if env::is_set(env::SEARCH_SERPER_API_KEY) {
                let api_key = require_env(env::SEARCH_SERPER_API_KEY)?;
                let provider = SerperProviderBuilder::new().api_key(api_key).build().context("building serper provider")?;
                providers.push(("serper".to_string(), Arc::new(provider)));
            }
            if env::is_set(env::SEARCH_BRAVE_API_KEY) {
                let api_key = require_env(env::SEARCH_BRAVE_API_KEY)?;
                let provider = BraveProviderBuilder::new().api_key(api_key).build().context("building brave provider")?;
                providers.push(("brave".to_string(), Arc::new(provider)));
            }
            anyhow::ensure!(!providers.is_empty(), "search.provider=multi requires at least one vendor api key");
            Ok(Arc::new(MultiProvider::new(providers, MultiProviderConfig::default())))
        }
    }
}

fn redis_url_from(redis: &research_core::config::RedisConfig) -> String {
    match &redis.password {
        Some(password) => format!("redis://:{password}@{}:{}/{}", redis.host, redis.port, redis.db),
        None => format!("redis://{}:{}/{}", redis.host, redis.port, redis.db),
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing required environment variable {name}"))
}
