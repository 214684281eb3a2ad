//! Research Worker (§4.H) and Delivery Worker (§4.I): the per-job bodies a
//! binary's queue-consumption loop drives. Both convert into
//! `research_core::Error` at their boundary so a caller can hand the
//! failure straight to `JobQueue::fail` without matching on crate-local
//! error types.

use std::sync::Arc;

use research_core::model::{DeliveryStatus, EpochMillis, Frequency, JobPayload, ProjectStatus};
use research_core::{Error, Result};
use research_email::{EmailSender, RateLimiter, SendRequest};
use research_pipeline::render::strip_references_and_links;
use research_pipeline::{run_pipeline, PipelineContext, PipelineOutcome};
use research_queue::{JobQueue, QueueName};
use research_store::ProjectStore;

use crate::clock::calculate_next_run_at;
use crate::jobs::delivery_job;

/// Everything a worker binary hands to a job handler: the pipeline's own
/// capability bundle plus the queue and email capabilities the pipeline
/// itself has no business knowing about.
#[derive(Clone)]
pub struct WorkerContext {
    pub pipeline: PipelineContext,
    pub queue: Arc<dyn JobQueue>,
    pub email: Arc<dyn EmailSender>,
    pub delivery_rate_limiter: Arc<RateLimiter>,
}

fn parse_timezone(name: &str) -> Result<chrono_tz::Tz> {
    name.parse::<chrono_tz::Tz>()
        .map_err(|_| Error::Validation(format!("unrecognized timezone '{name}'")))
}

/// §4.H. Reloads the project as the source of truth, flips it to
/// `running`, invokes the pipeline, and writes back the outcome.
pub async fn handle_research_job(worker: &WorkerContext, job: JobPayload) -> Result<()> {
    let store = &worker.pipeline.store;

    let Some(mut project) = store.get_project(job.user_id, job.project_id).await? else {
        tracing::warn!(project_id = %job.project_id, "research job for a project that no longer exists");
        return Ok(());
    };

    if matches!(project.status, ProjectStatus::Paused | ProjectStatus::Deleted)
        || project.has_prepared_log()
    {
        tracing::debug!(project_id = %job.project_id, "research job is a no-op: project paused, deleted, or already prepared");
        return Ok(());
    }

    if !job.is_run_now && job.next_run_at != project.next_run_at {
        tracing::info!(project_id = %job.project_id, "stale research job: project's nextRunAt has moved on");
        return Ok(());
    }

    project.status = ProjectStatus::Running;
    project.research_started_at = Some(EpochMillis::now());
    store.put_project(&project).await?;

    match run_pipeline(&worker.pipeline, job.user_id, job.project_id).await {
        Ok(PipelineOutcome::Skipped { reason }) => {
            tracing::info!(project_id = %job.project_id, reason, "research skipped");
            Ok(())
        }
        Ok(PipelineOutcome::Completed { delivery_log_id, .. }) => {
            let Some(mut current) = store.get_project(job.user_id, job.project_id).await? else {
                return Ok(());
            };
            if current.status == ProjectStatus::Deleted {
                return Ok(());
            }

            current.status = if current.frequency == Frequency::Once {
                ProjectStatus::Paused
            } else {
                ProjectStatus::Active
            };
            current.prepared_delivery_log_id = Some(delivery_log_id);
            current.prepared_at = Some(EpochMillis::now());
            current.research_started_at = None;
            current.last_error = None;
            store.put_project(&current).await?;

            worker
                .queue
                .enqueue(QueueName::Delivery, delivery_job(&current, job.is_run_now))
                .await?;
            Ok(())
        }
        Err(err) => {
            if let Some(mut current) = store.get_project(job.user_id, job.project_id).await? {
                current.status = ProjectStatus::Error;
                current.last_error = Some(err.to_string());
                current.research_started_at = None;
                store.put_project(&current).await?;
            }
            Err(err.into())
        }
    }
}

/// §4.I. Re-reads the project and its pending delivery log, sends the
/// rendered report, and advances the project on success. On failure
/// `preparedDeliveryLogId` is left untouched so the broker's retry sees
/// the same pending log next attempt.
pub async fn handle_delivery_job(worker: &WorkerContext, job: JobPayload) -> Result<()> {
    let store = &worker.pipeline.store;

    let Some(project) = store.get_project(job.user_id, job.project_id).await? else {
        tracing::warn!(project_id = %job.project_id, "delivery job for a project that no longer exists");
        return Ok(());
    };
    let Some(log_id) = project.prepared_delivery_log_id else {
        tracing::warn!(project_id = %job.project_id, "delivery job with no prepared delivery log");
        return Ok(());
    };
    let Some(mut log) = store.get_delivery_log(log_id).await? else {
        tracing::warn!(delivery_log_id = %log_id, "prepared delivery log is missing from the store");
        return Ok(());
    };

    let html_body = strip_references_and_links(&log.report_markdown);

    worker.delivery_rate_limiter.acquire().await;
    let response = worker
        .email
        .send(SendRequest {
            to: job.recipient_email.clone(),
            subject: log.report_title.clone(),
            html_body,
        })
        .await
        .map_err(Error::from)?;

    if !response.ok {
        let message = response
            .error
            .unwrap_or_else(|| "email vendor rejected the send".to_string());
        return Err(Error::EmailSend(message));
    }

    log.status = DeliveryStatus::Success;
    log.delivered_at = Some(EpochMillis::now());
    store.put_delivery_log(&log).await?;

    let mut updated = project;
    updated.prepared_delivery_log_id = None;
    updated.delivered_at = log.delivered_at;
    updated.last_run_at = log.delivered_at;
    if updated.frequency == Frequency::Once || job.is_one_shot {
        updated.status = ProjectStatus::Paused;
        updated.next_run_at = None;
        updated.this_run_is_one_shot = false;
    } else {
        let tz = parse_timezone(&updated.timezone)?;
        updated.next_run_at = calculate_next_run_at(
            updated.frequency,
            &updated.delivery_time,
            tz,
            updated.day_of_week,
            updated.day_of_month,
            chrono::Utc::now(),
        );
    }
    store.put_project(&updated).await?;

    if job.is_one_shot {
        let month = chrono::Utc::now().format("%Y%m");
        let key = format!("analytics:oneshot:{}:{month}", job.user_id);
        worker.pipeline.cache.incr_by(&key, 1).await;
    }

    Ok(())
}
