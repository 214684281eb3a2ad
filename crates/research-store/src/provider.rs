//! `ProjectStore` (§6.4): typed reads by `(userId, projectId)`, typed
//! writes, and the collection-wide predicate queries the scheduler and
//! reconciler drive their ticks from (§4.G, §4.J).

use async_trait::async_trait;

use research_core::model::{DeliveryLog, DeliveryLogId, EpochMillis, Project, ProjectId, UserId};

use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, user_id: UserId, project_id: ProjectId) -> Result<Option<Project>>;

    async fn put_project(&self, project: &Project) -> Result<()>;

    async fn get_delivery_log(&self, id: DeliveryLogId) -> Result<Option<DeliveryLog>>;

    async fn put_delivery_log(&self, log: &DeliveryLog) -> Result<()>;

    /// §4.G pre-run set: `status ∈ {active,error} ∧ preparedDeliveryLogId ==
    /// null ∧ now < nextRunAt ≤ now + window`.
    async fn pre_run_set(&self, now: EpochMillis, window: EpochMillis) -> Result<Vec<Project>>;

    /// §4.G retry set: `status ∈ {active,error} ∧ preparedDeliveryLogId ==
    /// null ∧ nextRunAt ≤ now`.
    async fn retry_set(&self, now: EpochMillis) -> Result<Vec<Project>>;

    /// §4.G delivery selection: `preparedDeliveryLogId != null ∧ nextRunAt
    /// ≤ now`.
    async fn due_delivery_set(&self, now: EpochMillis) -> Result<Vec<Project>>;

    /// §4.J pass 1: `status ∈ {active,error} ∧ preparedDeliveryLogId ==
    /// null`, irrespective of `nextRunAt`.
    async fn needs_research_set(&self) -> Result<Vec<Project>>;

    /// §4.J pass 2: `status = running ∧ now − researchStartedAt >
    /// stuckThreshold`.
    async fn stuck_running_set(&self, now: EpochMillis, stuck_threshold_ms: i64) -> Result<Vec<Project>>;

    /// §4.J pass 3: `preparedDeliveryLogId != null ∧ status ≠ deleted`.
    async fn needs_delivery_set(&self) -> Result<Vec<Project>>;
}
