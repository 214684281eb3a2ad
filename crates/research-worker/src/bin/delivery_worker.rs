//! Delivery worker binary (§4.I): dequeues delivery jobs and sends the
//! prepared report for each one.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use research_observability::{heartbeat, WorkerKind};
use research_queue::{FailOutcome, JobQueue, QueueName};
use research_scheduler::handle_delivery_job;
use research_worker::bootstrap::{bootstrap, CommonArgs};

const IDLE_POLL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let bootstrap_result = bootstrap(&args).await?;
    research_observability::init_tracing(
        research_observability::TracingConfig::new().with_service_name("delivery-worker"),
    )
    .await
    .ok();

    tracing::info!("delivery worker starting");

    loop {
        heartbeat::beat(&bootstrap_result.cache, WorkerKind::Delivery).await;

        match bootstrap_result.worker.queue.dequeue(QueueName::Delivery).await {
            Ok(Some(job)) => {
                let outcome = handle_delivery_job(&bootstrap_result.worker, job.payload.clone()).await;
                match outcome {
                    Ok(()) => {
                        bootstrap_result.worker.queue.complete(QueueName::Delivery, job.id).await.ok();
                        bootstrap_result.metrics.email_sends_total.with_label_values(&["ok"]).inc();
                    }
                    Err(err) => {
                        tracing::warn!(job_id = %job.id, error = %err, "delivery job failed");
                        bootstrap_result.metrics.email_sends_total.with_label_values(&["error"]).inc();
                        match bootstrap_result.worker.queue.fail(QueueName::Delivery, job.id, &err.to_string()).await {
                            Ok(FailOutcome::Retrying { .. }) => {
                                bootstrap_result.metrics.job_retries_total.with_label_values(&["delivery"]).inc();
                            }
                            Ok(FailOutcome::DeadLettered) => {
                                bootstrap_result.metrics.jobs_dead_lettered_total.with_label_values(&["delivery"]).inc();
                            }
                            Err(fail_err) => {
                                tracing::warn!(job_id = %job.id, error = %fail_err, "failed to record delivery job failure");
                            }
                        }
                    }
                }
            }
            Ok(None) => tokio::time::sleep(IDLE_POLL).await,
            Err(err) => {
                tracing::error!(error = %err, "failed to dequeue delivery job");
                tokio::time::sleep(IDLE_POLL).await;
            }
        }
    }
}
