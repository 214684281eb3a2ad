//! Scheduler tick (§4.G): two project-store queries select research work
//! (pre-run window plus overdue retry, deduped by project id) each tick;
//! a third selects delivery work. Selected research projects flip to
//! `running` before their job is enqueued; delivery selection never
//! touches project status, since `preparedDeliveryLogId` already gates a
//! second research enqueue until the delivery completes or is reconciled.

use std::collections::HashSet;
use std::sync::Arc;

use research_core::model::{EpochMillis, Project, ProjectStatus};
use research_core::Result;
use research_queue::{JobQueue, QueueName};
use research_store::ProjectStore;

use crate::jobs::{delivery_job, research_job};

/// §4.G default pre-run window.
pub const DEFAULT_PRE_RUN_WINDOW_MINUTES: u64 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub research_enqueued: u32,
    pub delivery_enqueued: u32,
}

pub struct Scheduler {
    store: Arc<dyn ProjectStore>,
    queue: Arc<dyn JobQueue>,
    pre_run_window_ms: i64,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ProjectStore>,
        queue: Arc<dyn JobQueue>,
        pre_run_window_minutes: u64,
    ) -> Self {
        Self {
            store,
            queue,
            pre_run_window_ms: i64::try_from(pre_run_window_minutes.saturating_mul(60_000))
                .unwrap_or(i64::MAX),
        }
    }

    /// Runs one selection pass. Call at least once a minute (§4.G).
    pub async fn tick(&self, now: EpochMillis) -> Result<TickReport> {
        let mut report = TickReport::default();
        let mut seen = HashSet::new();

        let window = EpochMillis(self.pre_run_window_ms);
        let mut due_for_research = self.store.pre_run_set(now, window).await?;
        due_for_research.extend(self.store.retry_set(now).await?);

        for project in due_for_research {
            if !seen.insert(project.id) {
                continue;
            }
            self.start_research(project).await?;
            report.research_enqueued += 1;
        }

        for project in self.store.due_delivery_set(now).await? {
            self.queue
                .enqueue(QueueName::Delivery, delivery_job(&project, false))
                .await?;
            report.delivery_enqueued += 1;
        }

        Ok(report)
    }

    async fn start_research(&self, mut project: Project) -> Result<()> {
        project.status = ProjectStatus::Running;
        project.research_started_at = Some(EpochMillis::now());
        let job = research_job(&project, false);
        self.store.put_project(&project).await?;
        self.queue.enqueue(QueueName::Research, job).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::model::{Frequency, ProjectId, SearchParameters, UserId};
    use research_testing::{InMemoryProjectStore, InMemoryQueue};

    fn sample_project(next_run_at: Option<EpochMillis>) -> Project {
        Project {
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
            next_run_at,
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
    async fn tick_enqueues_overdue_project_and_flips_it_to_running() {
        let store = Arc::new(InMemoryProjectStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let project = sample_project(Some(EpochMillis(1_000)));
        store.seed_project(project.clone());

        let scheduler = Scheduler::new(store.clone(), queue.clone(), DEFAULT_PRE_RUN_WINDOW_MINUTES);
        let report = scheduler.tick(EpochMillis(10_000)).await.unwrap();

        assert_eq!(report.research_enqueued, 1);
        assert_eq!(report.delivery_enqueued, 0);
        assert_eq!(queue.pending_count(QueueName::Research), 1);

        let stored = store.get_project(project.user_id, project.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Running);
    }

    #[tokio::test]
    async fn tick_picks_up_an_overdue_project_via_the_retry_set() {
        let store = Arc::new(InMemoryProjectStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let project = sample_project(Some(EpochMillis(5_000)));
        store.seed_project(project);

        let scheduler = Scheduler::new(store, queue.clone(), DEFAULT_PRE_RUN_WINDOW_MINUTES);
        let report = scheduler.tick(EpochMillis(10_000)).await.unwrap();

        assert_eq!(report.research_enqueued, 1);
        assert_eq!(queue.pending_count(QueueName::Research), 1);
    }

    #[tokio::test]
    async fn tick_enqueues_delivery_for_prepared_projects() {
        let store = Arc::new(InMemoryProjectStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let mut project = sample_project(Some(EpochMillis(1_000)));
        project.prepared_delivery_log_id = Some(research_core::model::DeliveryLogId::new());
        store.seed_project(project);

        let scheduler = Scheduler::new(store, queue.clone(), DEFAULT_PRE_RUN_WINDOW_MINUTES);
        let report = scheduler.tick(EpochMillis(10_000)).await.unwrap();

        assert_eq!(report.research_enqueued, 0);
        assert_eq!(report.delivery_enqueued, 1);
        assert_eq!(queue.pending_count(QueueName::Delivery), 1);
    }

    #[tokio::test]
    async fn tick_ignores_projects_with_no_work_due() {
        let store = Arc::new(InMemoryProjectStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        store.seed_project(sample_project(Some(EpochMillis(999_999))));

        let scheduler = Scheduler::new(store, queue, DEFAULT_PRE_RUN_WINDOW_MINUTES);
        let report = scheduler.tick(EpochMillis(10_000)).await.unwrap();

        assert_eq!(report, TickReport::default());
    }
}
