//! Research worker binary (§4.H): dequeues research jobs and runs the
//! pipeline against each one.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use research_observability::{heartbeat, WorkerKind};
use research_queue::{FailOutcome, JobQueue, QueueName};
use research_scheduler::handle_research_job;
use research_worker::bootstrap::{bootstrap, CommonArgs};

/// How long to sleep after finding the queue empty before polling again.
const IDLE_POLL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let bootstrap_result = bootstrap(&args).await?;
    research_observability::init_tracing(
        research_observability::TracingConfig::new().with_service_name("research-worker"),
    )
    .await
    .ok();

    tracing::info!("research worker starting");

    loop {
        heartbeat::beat(&bootstrap_result.cache, WorkerKind::Research).await;

        match bootstrap_result.worker.queue.dequeue(QueueName::Research).await {
            Ok(Some(job)) => {
                let timer = bootstrap_result.metrics.pipeline_duration_seconds.start_timer();
                let outcome = handle_research_job(&bootstrap_result.worker, job.payload.clone()).await;
                timer.observe_duration();
                match outcome {
                    Ok(()) => {
                        bootstrap_result.worker.queue.complete(QueueName::Research, job.id).await.ok();
                        bootstrap_result.metrics.pipeline_runs_total.with_label_values(&["completed"]).inc();
                    }
                    Err(err) => {
                        tracing::warn!(job_id = %job.id, error = %err, "research job failed");
                        bootstrap_result.metrics.pipeline_runs_total.with_label_values(&["failed"]).inc();
                        match bootstrap_result.worker.queue.fail(QueueName::Research, job.id, &err.to_string()).await {
                            Ok(FailOutcome::Retrying { .. }) => {
                                bootstrap_result.metrics.job_retries_total.with_label_values(&["research"]).inc();
                            }
                            Ok(FailOutcome::DeadLettered) => {
                                bootstrap_result.metrics.jobs_dead_lettered_total.with_label_values(&["research"]).inc();
                            }
                            Err(fail_err) => {
                                tracing::warn!(job_id = %job.id, error = %fail_err, "failed to record research job failure");
                            }
                        }
                    }
                }
            }
            Ok(None) => tokio::time::sleep(IDLE_POLL).await,
            Err(err) => {
                tracing::error!(error = %err, "failed to dequeue research job");
                tokio::time::sleep(IDLE_POLL).await;
            }
        }
    }
}
