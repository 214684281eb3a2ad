//! An in-memory [`JobQueue`], mirroring `RedisQueue`'s semantics (pop the
//! earliest pending job whose backoff delay has elapsed, same backoff
//! curve, same dead-letter threshold) without a live Redis connection.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use research_core::model::{JobId, JobPayload};
use research_queue::{EnqueueOutcome, FailOutcome, JobQueue, QueueDepths, QueueError, QueueName, QueuedJob};

type Result<T> = std::result::Result<T, QueueError>;

pub const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: i64 = 1_000;
const CAP_DELAY_MS: i64 = 10_000;

fn backoff_delay_ms(attempt: u32) -> i64 {
    let multiplier = 1i64.checked_shl(attempt.saturating_sub(1)).unwrap_or(i64::MAX);
    BASE_DELAY_MS.saturating_mul(multiplier).min(CAP_DELAY_MS)
}

struct PendingEntry {
    job_id: JobId,
    payload: JobPayload,
    attempt: u32,
    score_ms: i64,
}

struct ActiveEntry {
    payload: JobPayload,
    attempt: u32,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<PendingEntry>,
    active: HashMap<JobId, ActiveEntry>,
    idempotency_keys: std::collections::HashSet<String>,
    dead_count: u64,
}

#[derive(Default)]
pub struct InMemoryQueue {
    research: Mutex<QueueState>,
    delivery: Mutex<QueueState>,
}

impl InMemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, queue: QueueName) -> &Mutex<QueueState> {
        match queue {
            QueueName::Research => &self.research,
            QueueName::Delivery => &self.delivery,
        }
    }

    #[must_use]
    pub fn pending_count(&self, queue: QueueName) -> usize {
        self.state(queue).lock().unwrap().pending.len()
    }

    #[must_use]
    pub fn active_count(&self, queue: QueueName) -> usize {
        self.state(queue).lock().unwrap().active.len()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, queue: QueueName, payload: JobPayload) -> Result<EnqueueOutcome> {
        let idempotency_key = payload.idempotency_key();
        let mut state = self.state(queue).lock().unwrap();

        if !state.idempotency_keys.insert(idempotency_key) {
            return Ok(EnqueueOutcome::Deduplicated);
        }

        state.pending.push(PendingEntry {
            job_id: JobId::new(),
            payload,
            attempt: 0,
            score_ms: chrono::Utc::now().timestamp_millis(),
        });
        Ok(EnqueueOutcome::Enqueued)
    }

    async fn dequeue(&self, queue: QueueName) -> Result<Option<QueuedJob>> {
        let mut state = self.state(queue).lock().unwrap();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let min_index = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.score_ms <= now_ms)
            .min_by_key(|(_, entry)| entry.score_ms)
            .map(|(i, _)| i);

        let Some(index) = min_index else {
            return Ok(None);
        };
        let mut entry = state.pending.remove(index);
        entry.attempt += 1;

        let job = QueuedJob { id: entry.job_id, payload: entry.payload.clone(), attempt: entry.attempt };
        state.active.insert(entry.job_id, ActiveEntry { payload: entry.payload, attempt: entry.attempt });
        Ok(Some(job))
    }

    async fn complete(&self, queue: QueueName, job_id: JobId) -> Result<()> {
        let mut state = self.state(queue).lock().unwrap();
        if let Some(entry) = state.active.remove(&job_id) {
            state.idempotency_keys.remove(&entry.payload.idempotency_key());
        }
        Ok(())
    }

    async fn fail(&self, queue: QueueName, job_id: JobId, _error: &str) -> Result<FailOutcome> {
        let mut state = self.state(queue).lock().unwrap();
        let Some(entry) = state.active.remove(&job_id) else {
            return Err(QueueError::NotFound(job_id.to_string()));
        };

        if entry.attempt >= MAX_ATTEMPTS {
            state.idempotency_keys.remove(&entry.payload.idempotency_key());
            state.dead_count += 1;
            return Ok(FailOutcome::DeadLettered);
        }

        let next_run_ms = chrono::Utc::now().timestamp_millis() + backoff_delay_ms(entry.attempt);
        state.pending.push(PendingEntry { job_id, payload: entry.payload, attempt: entry.attempt, score_ms: next_run_ms });
        Ok(FailOutcome::Retrying { attempt: entry.attempt })
    }

    async fn apply_retention(&self, _queue: QueueName, _max_age_secs: u64) -> Result<u64> {
        Ok(0)
    }

    async fn depths(&self, queue: QueueName) -> Result<QueueDepths> {
        let state = self.state(queue).lock().unwrap();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let waiting = state.pending.iter().filter(|e| e.score_ms <= now_ms).count() as u64;
        let delayed = state.pending.len() as u64 - waiting;
        Ok(QueueDepths { waiting, active: state.active.len() as u64, delayed, failed: state.dead_count })
    }
}

#[cfg(test)]
impl InMemoryQueue {
    /// Test-only escape hatch: forces every pending entry in `queue` to be
    /// immediately due, so a retry test doesn't have to sleep out a real
    /// backoff window to observe a re-dequeue.
    fn force_all_due(&self, queue: QueueName) {
        let mut state = self.state(queue).lock().unwrap();
        for entry in &mut state.pending {
            entry.score_ms = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::model::{EpochMillis, ProjectId, UserId};

    fn sample_job(project_id: ProjectId) -> JobPayload {
        JobPayload {
            user_id: UserId::new(),
            project_id,
            project_title: "t".into(),
            recipient_email: "r@example.com".into(),
            next_run_at: Some(EpochMillis::now()),
            is_run_now: false,
            is_one_shot: false,
        }
    }

    #[tokio::test]
    async fn enqueue_dequeue_complete_round_trips() {
        let queue = InMemoryQueue::new();
        let payload = sample_job(ProjectId::new());
        assert_eq!(queue.enqueue(QueueName::Research, payload).await.unwrap(), EnqueueOutcome::Enqueued);

        let job = queue.dequeue(QueueName::Research).await.unwrap().unwrap();
        assert_eq!(job.attempt, 1);
        assert_eq!(queue.active_count(QueueName::Research), 1);

        queue.complete(QueueName::Research, job.id).await.unwrap();
        assert_eq!(queue.active_count(QueueName::Research), 0);
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_deduplicated() {
        let queue = InMemoryQueue::new();
        let project_id = ProjectId::new();
        let next_run_at = Some(EpochMillis(5_000));
        let payload_a = JobPayload { next_run_at, ..sample_job(project_id) };
        let payload_b = JobPayload { next_run_at, ..sample_job(project_id) };

        assert_eq!(queue.enqueue(QueueName::Research, payload_a).await.unwrap(), EnqueueOutcome::Enqueued);
        assert_eq!(queue.enqueue(QueueName::Research, payload_b).await.unwrap(), EnqueueOutcome::Deduplicated);
    }

    #[tokio::test]
    async fn fail_retries_until_attempt_budget_exhausted_then_dead_letters() {
        let queue = InMemoryQueue::new();
        queue.enqueue(QueueName::Research, sample_job(ProjectId::new())).await.unwrap();

        let mut job_id = queue.dequeue(QueueName::Research).await.unwrap().unwrap().id;
        for _ in 0..MAX_ATTEMPTS - 1 {
            let outcome = queue.fail(QueueName::Research, job_id, "boom").await.unwrap();
            assert!(matches!(outcome, FailOutcome::Retrying { .. }));
            // A failed job is requeued with a backoff delay; force it due
            // rather than sleeping out the real 1s/2s/4s window.
            queue.force_all_due(QueueName::Research);
            job_id = queue.dequeue(QueueName::Research).await.unwrap().unwrap().id;
        }

        let outcome = queue.fail(QueueName::Research, job_id, "boom").await.unwrap();
        assert_eq!(outcome, FailOutcome::DeadLettered);

        let depths = queue.depths(QueueName::Research).await.unwrap();
        assert_eq!(depths.failed, 1);
        assert_eq!(depths.active, 0);
        assert_eq!(depths.waiting, 0);
    }

    #[tokio::test]
    async fn depths_separates_waiting_from_delayed() {
        let queue = InMemoryQueue::new();
        queue.enqueue(QueueName::Research, sample_job(ProjectId::new())).await.unwrap();
        let job = queue.dequeue(QueueName::Research).await.unwrap().unwrap();
        queue.fail(QueueName::Research, job.id, "transient").await.unwrap();

        let depths = queue.depths(QueueName::Research).await.unwrap();
        assert_eq!(depths.delayed, 1);
        assert_eq!(depths.waiting, 0);
    }
}
