//! Recovery Reconciler (§4.J): three passes over the project store that
//! re-enqueue work a crashed or stalled worker left behind. Runs once at
//! startup and periodically thereafter; the admin recovery endpoint
//! drives the same function out-of-band. A failure on one project is
//! counted and logged, never aborts the rest of the pass.

use std::sync::Arc;

use research_core::model::{EpochMillis, ProjectStatus};
use research_queue::{JobQueue, QueueName};
use research_store::ProjectStore;

use crate::jobs::{delivery_job, research_job};

/// §4.J default: a research attempt stuck in `running` longer than this
/// is considered dead.
pub const DEFAULT_STUCK_THRESHOLD_MINUTES: u64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub needs_research: u32,
    pub stuck_reset: u32,
    pub needs_delivery: u32,
    pub errors: u32,
}

pub async fn run_once(
    store: &Arc<dyn ProjectStore>,
    queue: &Arc<dyn JobQueue>,
    now: EpochMillis,
    stuck_threshold_minutes: u64,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let stuck_threshold_ms =
        i64::try_from(stuck_threshold_minutes.saturating_mul(60_000)).unwrap_or(i64::MAX);

    needs_research_pass(store, queue, &mut report).await;
    stuck_running_pass(store, queue, now, stuck_threshold_ms, &mut report).await;
    needs_delivery_pass(store, queue, now, &mut report).await;

    report
}

async fn needs_research_pass(
    store: &Arc<dyn ProjectStore>,
    queue: &Arc<dyn JobQueue>,
    report: &mut ReconcileReport,
) {
    match store.needs_research_set().await {
        Ok(projects) => {
            for project in projects {
                match queue
                    .enqueue(QueueName::Research, research_job(&project, false))
                    .await
                {
                    Ok(_) => report.needs_research += 1,
                    Err(err) => {
                        tracing::warn!(project_id = %project.id, error = %err, "reconciler: failed to re-enqueue research");
                        report.errors += 1;
                    }
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "reconciler: needs-research pass failed");
            report.errors += 1;
        }
    }
}

async fn stuck_running_pass(
    store: &Arc<dyn ProjectStore>,
    queue: &Arc<dyn JobQueue>,
    now: EpochMillis,
    stuck_threshold_ms: i64,
    report: &mut ReconcileReport,
) {
    match store.stuck_running_set(now, stuck_threshold_ms).await {
        Ok(projects) => {
            for mut project in projects {
                project.status = ProjectStatus::Error;
                project.last_error = Some("stuck".to_string());
                project.research_started_at = None;
                let next_run_at = project.next_run_at;

                if let Err(err) = store.put_project(&project).await {
                    tracing::warn!(project_id = %project.id, error = %err, "reconciler: failed to reset stuck project");
                    report.errors += 1;
                    continue;
                }
                report.stuck_reset += 1;

                if next_run_at.is_some() {
                    if let Err(err) = queue
                        .enqueue(QueueName::Research, research_job(&project, false))
                        .await
                    {
                        tracing::warn!(project_id = %project.id, error = %err, "reconciler: failed to re-enqueue stuck project");
                        report.errors += 1;
                    }
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "reconciler: stuck-running pass failed");
            report.errors += 1;
        }
    }
}

async fn needs_delivery_pass(
    store: &Arc<dyn ProjectStore>,
    queue: &Arc<dyn JobQueue>,
    now: EpochMillis,
    report: &mut ReconcileReport,
) {
    match store.needs_delivery_set().await {
        Ok(projects) => {
            for project in projects {
                let is_run_now = project.next_run_at.map_or(true, |t| t <= now);
                match queue
                    .enqueue(QueueName::Delivery, delivery_job(&project, is_run_now))
                    .await
                {
                    Ok(_) => report.needs_delivery += 1,
                    Err(err) => {
                        tracing::warn!(project_id = %project.id, error = %err, "reconciler: failed to re-enqueue delivery");
                        report.errors += 1;
                    }
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "reconciler: needs-delivery pass failed");
            report.errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::model::{DeliveryLogId, Frequency, ProjectId, SearchParameters, UserId};
    use research_testing::{InMemoryProjectStore, InMemoryQueue};

    fn sample_project() -> research_core::model::Project {
        research_core::model::Project {
            id: ProjectId::new(),
            user_id: UserId::new(),
            title: "AI trends".into(),
            description: "Weekly AI trend digest".into(),
            frequency: Frequency::Weekly,
            delivery_time: "09:00".into(),
            timezone: "UTC".into(),
            day_of_week: Some(1),
            day_of_month: None,
            status: ProjectStatus::Active,
            recipient_email: "reader@example.com".into(),
            search_parameters: SearchParameters::default(),
            next_run_at: None,
            last_run_at: None,
            research_started_at: None,
            prepared_delivery_log_id: None,
            prepared_at: None,
            delivered_at: None,
            last_error: None,
            this_run_is_one_shot: false,
        }
    }

    #[tokio::test]
    async fn needs_research_pass_re_enqueues_active_projects_without_a_prepared_log() {
        let store = Arc::new(InMemoryProjectStore::new());
        store.seed_project(sample_project());
        let store: Arc<dyn ProjectStore> = store;
        let queue: Arc<dyn JobQueue> = Arc::new(InMemoryQueue::new());

        let report = run_once(&store, &queue, EpochMillis(0), DEFAULT_STUCK_THRESHOLD_MINUTES).await;

        assert_eq!(report.needs_research, 1);
        assert_eq!(report.errors, 0);
    }

    #[tokio::test]
    async fn stuck_running_pass_resets_a_project_past_the_threshold_and_re_enqueues_it() {
        let fake_store = Arc::new(InMemoryProjectStore::new());
        let mut project = sample_project();
        project.status = ProjectStatus::Running;
        project.research_started_at = Some(EpochMillis(0));
        project.next_run_at = Some(EpochMillis(5_000));
        let project_id = project.id;
        let user_id = project.user_id;
        fake_store.seed_project(project);

        let store: Arc<dyn ProjectStore> = fake_store;
        let queue: Arc<dyn JobQueue> = Arc::new(InMemoryQueue::new());

        let now = EpochMillis(10 * 60_000);
        let report = run_once(&store, &queue, now, DEFAULT_STUCK_THRESHOLD_MINUTES).await;

        assert_eq!(report.stuck_reset, 1);
        assert_eq!(report.errors, 0);

        let updated = store.get_project(user_id, project_id).await.unwrap().unwrap();
        assert_eq!(updated.status, ProjectStatus::Error);
        assert_eq!(updated.last_error, Some("stuck".to_string()));
    }

    #[tokio::test]
    async fn needs_delivery_pass_re_enqueues_prepared_projects() {
        let fake_store = Arc::new(InMemoryProjectStore::new());
        let mut project = sample_project();
        project.prepared_delivery_log_id = Some(DeliveryLogId::new());
        fake_store.seed_project(project);
        let store: Arc<dyn ProjectStore> = fake_store;

        let fake_queue = Arc::new(InMemoryQueue::new());
        let queue: Arc<dyn JobQueue> = fake_queue.clone();

        let report = run_once(&store, &queue, EpochMillis(0), DEFAULT_STUCK_THRESHOLD_MINUTES).await;

        assert_eq!(report.needs_delivery, 1);
        assert_eq!(fake_queue.pending_count(QueueName::Delivery), 1);
    }
}
