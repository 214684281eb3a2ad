//! HTTP server exposing `/metrics` (Prometheus scrape) and `/health`
//! (plain liveness) for a worker binary.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::metrics::ResearchMetrics;

/// Binds `port` and serves until the returned future is awaited to
/// completion (i.e. forever, absent a shutdown signal upstream).
pub async fn serve_metrics(port: u16, metrics: Arc<ResearchMetrics>) -> Result<()> {
    let (_, server_future) = serve_metrics_with_addr(port, metrics).await?;
    server_future.await
}

/// Same as [`serve_metrics`] but returns the bound address before
/// awaiting, so tests (and a port-0 caller) can discover the actual port.
pub async fn serve_metrics_with_addr(
    port: u16,
    metrics: Arc<ResearchMetrics>,
) -> Result<(std::net::SocketAddr, impl std::future::Future<Output = Result<()>>)> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(metrics);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Initialization(format!("failed to bind {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| Error::Initialization(format!("failed to read local addr: {e}")))?;

    tracing::info!(%local_addr, "metrics server listening");

    let server_future = async move {
        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Initialization(format!("metrics server error: {e}")))?;
        Ok(())
    };

    Ok((local_addr, server_future))
}

async fn metrics_handler(State(metrics): State<Arc<ResearchMetrics>>) -> Response {
    match metrics.export() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn metrics_endpoint_reports_registered_families() {
        let metrics = Arc::new(ResearchMetrics::new().unwrap());
        metrics.pipeline_runs_total.with_label_values(&["completed"]).inc();

        let (addr, server_future) = serve_metrics_with_addr(0, metrics).await.unwrap();
        let handle = tokio::spawn(server_future);

        let client = reqwest::Client::new();
        let response = tokio::time::timeout(
            Duration::from_secs(2),
            client.get(format!("http://{addr}/metrics")).send(),
        )
        .await
        .expect("request did not time out")
        .expect("request succeeded");

        assert_eq!(response.status(), 200);
        let body = response.text().await.unwrap();
        assert!(body.contains("research_pipeline_runs_total"));

        handle.abort();
    }
}
