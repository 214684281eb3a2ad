//! Scheduler binary (§4.G): ticks at a fixed cadence, selecting research
//! and delivery work that has come due and enqueuing it.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use research_core::config::env;
use research_core::model::EpochMillis;
use research_observability::{heartbeat, WorkerKind};
use research_scheduler::{tick::DEFAULT_PRE_RUN_WINDOW_MINUTES, Scheduler};
use research_worker::bootstrap::{bootstrap, CommonArgs};

/// Minimum sensible tick cadence regardless of configuration; the §4.G
/// contract only promises "at least once a minute".
const TICK_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let bootstrap_result = bootstrap(&args).await?;
    research_observability::init_tracing(
        research_observability::TracingConfig::new().with_service_name("scheduler"),
    )
    .await
    .ok();

    if !env::bool_or_default(env::SCHEDULER_ENABLED, true) {
        tracing::info!("scheduler disabled via SCHEDULER_ENABLED; idling");
        loop {
            heartbeat::beat(&bootstrap_result.cache, WorkerKind::Scheduler).await;
            tokio::time::sleep(TICK_INTERVAL).await;
        }
    }

    let window_minutes = env::u64_or_default(env::SCHEDULER_CHECK_WINDOW_MINUTES, DEFAULT_PRE_RUN_WINDOW_MINUTES);
    let scheduler = Scheduler::new(
        bootstrap_result.worker.pipeline.store.clone(),
        bootstrap_result.worker.queue.clone(),
        window_minutes,
    );

    tracing::info!(window_minutes, "scheduler starting");

    if env::bool_or_default(env::RUN_ON_STARTUP, true) {
        run_tick(&scheduler).await;
    }

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        heartbeat::beat(&bootstrap_result.cache, WorkerKind::Scheduler).await;
        run_tick(&scheduler).await;
    }
}

async fn run_tick(scheduler: &Scheduler) {
    match scheduler.tick(EpochMillis::now()).await {
        Ok(report) => tracing::info!(
            research_enqueued = report.research_enqueued,
            delivery_enqueued = report.delivery_enqueued,
            "scheduler tick complete"
        ),
        Err(err) => tracing::error!(error = %err, "scheduler tick failed"),
    }
}
