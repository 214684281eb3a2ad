//! `JobQueue` (§3 Job, §4.G enqueue idempotence): two named queues
//! (research, delivery), each FIFO-by-enqueue-time, each deduplicated by
//! `JobPayload::idempotency_key` so a re-schedule before a prior job
//! completes is a no-op.

use async_trait::async_trait;
use research_core::model::{JobId, JobPayload};

use crate::error::QueueError;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Research,
    Delivery,
}

impl QueueName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Research => "research",
            QueueName::Delivery => "delivery",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: JobId,
    pub payload: JobPayload,
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A fresh job entered the pending set.
    Enqueued,
    /// A job with the same idempotency key is already pending or
    /// in-flight; the enqueue was a no-op (§4.G).
    Deduplicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Re-queued with a backoff delay before the next attempt is visible.
    Retrying { attempt: u32 },
    /// Attempt budget exhausted; moved to the dead letter set.
    DeadLettered,
}

/// Queue depth snapshot for the admin health endpoint (§6.3):
/// `{waiting, active, delayed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueDepths {
    /// Pending jobs whose backoff delay has elapsed; ready to be dequeued.
    pub waiting: u64,
    /// Dequeued, not yet completed or failed.
    pub active: u64,
    /// Pending jobs still in their backoff delay window.
    pub delayed: u64,
    /// Dead-lettered jobs (attempt budget exhausted).
    pub failed: u64,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, queue: QueueName, payload: JobPayload) -> Result<EnqueueOutcome>;

    /// Pops the oldest pending job, if any, and marks it in-flight.
    async fn dequeue(&self, queue: QueueName) -> Result<Option<QueuedJob>>;

    /// Marks a job complete, releasing its idempotency key and in-flight
    /// marker, and recording it for retention cleanup.
    async fn complete(&self, queue: QueueName, job_id: JobId) -> Result<()>;

    /// Marks a job failed. Re-queues with exponential backoff unless the
    /// attempt budget is exhausted, in which case it is dead-lettered.
    async fn fail(&self, queue: QueueName, job_id: JobId, error: &str) -> Result<FailOutcome>;

    /// Removes completed/failed/dead-lettered entries older than
    /// `max_age_secs` (job options: "retention by age", §3).
    async fn apply_retention(&self, queue: QueueName, max_age_secs: u64) -> Result<u64>;

    /// Snapshot of waiting/active/delayed/failed counts for `GET
    /// /admin/queue/health` (§6.3).
    async fn depths(&self, queue: QueueName) -> Result<QueueDepths>;
}
