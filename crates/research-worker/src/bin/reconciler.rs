//! Reconciler binary (§4.J): runs the recovery reconciler once at startup
//! and then on a fixed interval, catching work a crashed or stalled
//! worker left behind.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use research_core::model::EpochMillis;
use research_observability::{heartbeat, WorkerKind};
use research_scheduler::reconciler::DEFAULT_STUCK_THRESHOLD_MINUTES;
use research_scheduler::reconcile_once;
use research_worker::bootstrap::{bootstrap, CommonArgs};

/// Default cadence between reconciler passes, per the "periodic plus
/// startup" decision: frequent enough that a stuck project doesn't sit
/// past its stuck threshold for long, infrequent enough not to hammer the
/// project store.
const RECONCILE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let bootstrap_result = bootstrap(&args).await?;
    research_observability::init_tracing(
        research_observability::TracingConfig::new().with_service_name("reconciler"),
    )
    .await
    .ok();

    let store = bootstrap_result.worker.pipeline.store.clone();
    let queue = bootstrap_result.worker.queue.clone();

    tracing::info!("reconciler starting");
    run_pass(&store, &queue).await;

    let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        heartbeat::beat(&bootstrap_result.cache, WorkerKind::Reconciler).await;
        run_pass(&store, &queue).await;
    }
}

async fn run_pass(
    store: &std::sync::Arc<dyn research_store::ProjectStore>,
    queue: &std::sync::Arc<dyn research_queue::JobQueue>,
) {
    let report = reconcile_once(store, queue, EpochMillis::now(), DEFAULT_STUCK_THRESHOLD_MINUTES).await;
    tracing::info!(
        needs_research = report.needs_research,
        stuck_reset = report.stuck_reset,
        needs_delivery = report.needs_delivery,
        errors = report.errors,
        "reconciler pass complete"
    );
}
