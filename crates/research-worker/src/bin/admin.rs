//! Admin binary (§6.3): `POST /admin/queue/recover`, `GET
//! /admin/queue/health`, plus the `GET /metrics` Prometheus exposition
//! endpoint on a second port.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;

use research_core::model::EpochMillis;
use research_observability::{aggregate_health, serve_metrics, HealthReport, ResearchMetrics};
use research_queue::JobQueue;
use research_scheduler::{reconcile_once, reconciler::DEFAULT_STUCK_THRESHOLD_MINUTES};
use research_store::ProjectStore;
use research_worker::bootstrap::{bootstrap, CommonArgs};

#[derive(Parser, Debug, Clone)]
struct AdminArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Port the admin HTTP server listens on.
    #[arg(long, default_value_t = 8090)]
    port: u16,

    /// Port the `/metrics` Prometheus exposition server listens on.
    #[arg(long, default_value_t = 9090)]
    metrics_port: u16,
}

#[derive(Clone)]
struct AdminState {
    cache: research_cache::CacheStore,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ProjectStore>,
    metrics: Arc<ResearchMetrics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecoverResponse {
    recovered: u32,
    stuck_reset: u32,
    errors: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AdminArgs::parse();
    let bootstrap_result = bootstrap(&args.common).await?;
    research_observability::init_tracing(research_observability::TracingConfig::new().with_service_name("admin"))
        .await
        .ok();

    let metrics: Arc<ResearchMetrics> = bootstrap_result.metrics.clone();
    let metrics_server_handle = metrics.clone();
    tokio::spawn(async move {
        if let Err(err) = serve_metrics(args.metrics_port, metrics_server_handle).await {
            tracing::error!(error = %err, "metrics server exited");
        }
    });

    let state = AdminState {
        cache: bootstrap_result.cache,
        queue: bootstrap_result.worker.queue,
        store: bootstrap_result.worker.pipeline.store,
        metrics,
    };

    let app = Router::new()
        .route("/admin/queue/recover", post(recover_handler))
        .route("/admin/queue/health", get(health_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "admin server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn recover_handler(State(state): State<AdminState>) -> Response {
    let report = reconcile_once(&state.store, &state.queue, EpochMillis::now(), DEFAULT_STUCK_THRESHOLD_MINUTES).await;
    let body = RecoverResponse {
        recovered: report.needs_research + report.needs_delivery,
        stuck_reset: report.stuck_reset,
        errors: report.errors,
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn health_handler(State(state): State<AdminState>) -> Response {
    let report: HealthReport = aggregate_health(&state.cache, &state.queue).await;
    record_queue_depth(&state.metrics, "research", &report.queues.research);
    record_queue_depth(&state.metrics, "delivery", &report.queues.delivery);
    let status = if report.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report)).into_response()
}

fn record_queue_depth(metrics: &ResearchMetrics, queue: &str, health: &research_observability::QueueHealth) {
    metrics.queue_depth.with_label_values(&[queue, "waiting"]).set(health.waiting as i64);
    metrics.queue_depth.with_label_values(&[queue, "active"]).set(health.active as i64);
    metrics.queue_depth.with_label_values(&[queue, "delayed"]).set(health.delayed as i64);
    metrics.queue_depth.with_label_values(&[queue, "failed"]).set(health.failed as i64);
}
