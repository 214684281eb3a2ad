//! An in-memory [`ProjectStore`] backing the scheduler/reconciler tests:
//! plain `HashMap`s behind a `Mutex`, with the same predicate queries the
//! Postgres implementation serves.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use research_core::model::{DeliveryLog, DeliveryLogId, EpochMillis, Project, ProjectId, ProjectStatus, UserId};
use research_store::{ProjectStore, StoreError};

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: Mutex<HashMap<ProjectId, Project>>,
    delivery_logs: Mutex<HashMap<DeliveryLogId, DeliveryLog>>,
}

impl InMemoryProjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_project(&self, project: Project) {
        self.projects.lock().unwrap().insert(project.id, project);
    }

    pub fn seed_delivery_log(&self, log: DeliveryLog) {
        self.delivery_logs.lock().unwrap().insert(log.id, log);
    }

    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.lock().unwrap().len()
    }
}

fn needs_research(project: &Project) -> bool {
    matches!(project.status, ProjectStatus::Active | ProjectStatus::Error) && !project.has_prepared_log()
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn get_project(&self, _user_id: UserId, project_id: ProjectId) -> Result<Option<Project>> {
        Ok(self.projects.lock().unwrap().get(&project_id).cloned())
    }

    async fn put_project(&self, project: &Project) -> Result<()> {
        self.projects.lock().unwrap().insert(project.id, project.clone());
        Ok(())
    }

    async fn get_delivery_log(&self, id: DeliveryLogId) -> Result<Option<DeliveryLog>> {
        Ok(self.delivery_logs.lock().unwrap().get(&id).cloned())
    }

    async fn put_delivery_log(&self, log: &DeliveryLog) -> Result<()> {
        self.delivery_logs.lock().unwrap().insert(log.id, log.clone());
        Ok(())
    }

    async fn pre_run_set(&self, now: EpochMillis, window: EpochMillis) -> Result<Vec<Project>> {
        let deadline = EpochMillis(now.0.saturating_add(window.0));
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| needs_research(p) && p.next_run_at.is_some_and(|t| t > now && t <= deadline))
            .cloned()
            .collect())
    }

    async fn retry_set(&self, now: EpochMillis) -> Result<Vec<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| needs_research(p) && p.next_run_at.is_some_and(|t| t <= now))
            .cloned()
            .collect())
    }

    async fn due_delivery_set(&self, now: EpochMillis) -> Result<Vec<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.has_prepared_log() && p.next_run_at.is_some_and(|t| t <= now))
            .cloned()
            .collect())
    }

    async fn needs_research_set(&self) -> Result<Vec<Project>> {
        Ok(self.projects.lock().unwrap().values().filter(|p| needs_research(p)).cloned().collect())
    }

    async fn stuck_running_set(&self, now: EpochMillis, stuck_threshold_ms: i64) -> Result<Vec<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| {
                p.status == ProjectStatus::Running
                    && p.research_started_at.is_some_and(|started| now.0 - started.0 > stuck_threshold_ms)
            })
            .cloned()
            .collect())
    }

    async fn needs_delivery_set(&self) -> Result<Vec<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.has_prepared_log() && p.status != ProjectStatus::Deleted)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::model::{Frequency, SearchParameters};

    fn sample_project(status: ProjectStatus, next_run_at: Option<EpochMillis>) -> Project {
        Project {
            id: ProjectId::new(),
            user_id: UserId::new(),
            title: "t".into(),
            description: "d".into(),
            frequency: Frequency::Daily,
            delivery_time: "09:00".into(),
            timezone: "UTC".into(),
            day_of_week: None,
            day_of_month: None,
            status,
            recipient_email: "r@example.com".into(),
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
    async fn put_then_get_round_trips() {
        let store = InMemoryProjectStore::new();
        let project = sample_project(ProjectStatus::Active, None);
        store.put_project(&project).await.unwrap();

        let fetched = store.get_project(project.user_id, project.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, project.id);
    }

    #[tokio::test]
    async fn retry_set_only_includes_overdue_active_projects() {
        let store = InMemoryProjectStore::new();
        let now = EpochMillis(10_000);
        let overdue = sample_project(ProjectStatus::Active, Some(EpochMillis(1_000)));
        let future = sample_project(ProjectStatus::Active, Some(EpochMillis(20_000)));
        store.seed_project(overdue.clone());
        store.seed_project(future);

        let retry = store.retry_set(now).await.unwrap();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].id, overdue.id);
    }

    #[tokio::test]
    async fn stuck_running_set_requires_elapsed_threshold() {
        let store = InMemoryProjectStore::new();
        let mut stuck = sample_project(ProjectStatus::Running, None);
        stuck.research_started_at = Some(EpochMillis(0));
        store.seed_project(stuck.clone());

        let result = store.stuck_running_set(EpochMillis(10_000), 5_000).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, stuck.id);

        let too_soon = store.stuck_running_set(EpochMillis(3_000), 5_000).await.unwrap();
        assert!(too_soon.is_empty());
    }
}
