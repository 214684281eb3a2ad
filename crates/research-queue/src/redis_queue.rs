//! `RedisQueue`: the sole production `JobQueue`, grounded on
//! `dashflow-redis-checkpointer`'s atomic-pipeline and key-prefix/sorted-set
//! patterns, applied to job scheduling instead of checkpoint ordering.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;

use research_core::model::{JobId, JobPayload};

use crate::broker::{EnqueueOutcome, FailOutcome, JobQueue, QueueDepths, QueueName, QueuedJob, Result};
use crate::error::QueueError;

const MAX_RECONNECTS: usize = 3;
const MAX_RECONNECT_DELAY_MS: u64 = 2_000;

/// Mirrors `research_search::retry`'s "1s→2s→4s→8s, cap 10s, up to N=3
/// attempts" policy, applied to requeue delay instead of an in-process
/// sleep loop since a requeued job is scheduled into the future rather
/// than retried inline.
pub const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: i64 = 1_000;
const CAP_DELAY_MS: i64 = 10_000;

fn backoff_delay_ms(attempt: u32) -> i64 {
    let multiplier = 1i64.checked_shl(attempt.saturating_sub(1)).unwrap_or(i64::MAX);
    BASE_DELAY_MS.saturating_mul(multiplier).min(CAP_DELAY_MS)
}

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    key_prefix: String,
    idempotency_ttl_secs: u64,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        Self::with_key_prefix(redis_url, "research", 86_400).await
    }

    pub async fn with_key_prefix(
        redis_url: &str,
        key_prefix: &str,
        idempotency_ttl_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(MAX_RECONNECTS)
            .set_max_delay(MAX_RECONNECT_DELAY_MS);
        let conn = client.get_connection_manager_with_config(manager_config).await?;
        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
            idempotency_ttl_secs,
        })
    }

    fn pending_key(&self, queue: QueueName) -> String {
        format!("{}:{}:pending", self.key_prefix, queue.as_str())
    }

    fn job_key(&self, queue: QueueName, job_id: JobId) -> String {
        format!("{}:{}:job:{}", self.key_prefix, queue.as_str(), job_id)
    }

    fn idempotency_key(&self, queue: QueueName, key: &str) -> String {
        format!("{}:{}:idem:{}", self.key_prefix, queue.as_str(), key)
    }

    fn completed_set_key(&self, queue: QueueName) -> String {
        format!("{}:{}:completed", self.key_prefix, queue.as_str())
    }

    fn completed_record_key(&self, queue: QueueName, job_id: JobId) -> String {
        format!("{}:{}:completed:{}", self.key_prefix, queue.as_str(), job_id)
    }

    fn dead_set_key(&self, queue: QueueName) -> String {
        format!("{}:{}:dead", self.key_prefix, queue.as_str())
    }

    /// Dequeued-but-not-yet-settled jobs, scored by dequeue time. A job
    /// leaves this set on `complete` or `fail`, whichever comes first.
    fn active_set_key(&self, queue: QueueName) -> String {
        format!("{}:{}:active", self.key_prefix, queue.as_str())
    }

    fn dead_record_key(&self, queue: QueueName, job_id: JobId) -> String {
        format!("{}:{}:dead:{}", self.key_prefix, queue.as_str(), job_id)
    }

    async fn remove_job(&self, queue: QueueName, job_id: JobId) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.job_key(queue, job_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, queue: QueueName, payload: JobPayload) -> Result<EnqueueOutcome> {
        let idempotency_key = payload.idempotency_key();
        let idem_redis_key = self.idempotency_key(queue, &idempotency_key);
        let job_id = JobId::new();

        let mut conn = self.conn.clone();
        let set: bool = redis::cmd("SET")
            .arg(&idem_redis_key)
            .arg(job_id.to_string())
            .arg("NX")
            .arg("EX")
            .arg(self.idempotency_ttl_secs)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map(|r| r.is_some())
            .map_err(QueueError::Redis)?;

        if !set {
            return Ok(EnqueueOutcome::Deduplicated);
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let payload_json = serde_json::to_string(&payload).map_err(QueueError::Json)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.hset_multiple(
            self.job_key(queue, job_id),
            &[
                ("payload", payload_json.as_str()),
                ("attempt", "0"),
                ("idempotency_key", idempotency_key.as_str()),
            ],
        );
        pipe.zadd(self.pending_key(queue), job_id.to_string(), now_ms as f64);
        pipe.query_async::<()>(&mut conn).await.map_err(QueueError::Redis)?;

        Ok(EnqueueOutcome::Enqueued)
    }

    async fn dequeue(&self, queue: QueueName) -> Result<Option<QueuedJob>> {
        let mut conn = self.conn.clone();
        let due_before_ms = chrono::Utc::now().timestamp_millis();
        // Only the earliest job whose backoff delay has elapsed is visible;
        // a job still in its backoff window must not be popped early.
        let due: Vec<String> = conn
            .zrangebyscore_limit(self.pending_key(queue), f64::NEG_INFINITY, due_before_ms as f64, 0, 1)
            .await
            .map_err(QueueError::Redis)?;
        let Some(job_id_str) = due.into_iter().next() else {
            return Ok(None);
        };
        let removed: u64 = conn
            .zrem(self.pending_key(queue), &job_id_str)
            .await
            .map_err(QueueError::Redis)?;
        if removed == 0 {
            // Lost the race to another dequeuer; nothing to hand back.
            return Ok(None);
        }
        let job_id = JobId(job_id_str.parse().map_err(|_| {
            QueueError::NotFound(format!("malformed job id in pending set: {job_id_str}"))
        })?);

        let job_key = self.job_key(queue, job_id);
        let payload_json: Option<String> = conn.hget(&job_key, "payload").await.map_err(QueueError::Redis)?;
        let Some(payload_json) = payload_json else {
            return Ok(None);
        };
        let payload: JobPayload = serde_json::from_str(&payload_json).map_err(QueueError::Json)?;
        let attempt: u32 = conn
            .hincr(&job_key, "attempt", 1)
            .await
            .map_err(QueueError::Redis)?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        conn.zadd::<_, _, _, ()>(self.active_set_key(queue), job_id.to_string(), now_ms as f64)
            .await
            .map_err(QueueError::Redis)?;

        Ok(Some(QueuedJob { id: job_id, payload, attempt }))
    }

    async fn complete(&self, queue: QueueName, job_id: JobId) -> Result<()> {
        let mut conn = self.conn.clone();
        let job_key = self.job_key(queue, job_id);
        let idempotency_key: Option<String> =
            conn.hget(&job_key, "idempotency_key").await.map_err(QueueError::Redis)?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.hset(self.completed_record_key(queue, job_id), "completed_at", now_ms);
        pipe.zadd(self.completed_set_key(queue), job_id.to_string(), now_ms as f64);
        pipe.zrem(self.active_set_key(queue), job_id.to_string());
        pipe.del(&job_key);
        if let Some(key) = &idempotency_key {
            pipe.del(self.idempotency_key(queue, key));
        }
        pipe.query_async::<()>(&mut conn).await.map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn fail(&self, queue: QueueName, job_id: JobId, error: &str) -> Result<FailOutcome> {
        let mut conn = self.conn.clone();
        let job_key = self.job_key(queue, job_id);
        let attempt: Option<u32> = conn.hget(&job_key, "attempt").await.map_err(QueueError::Redis)?;
        let Some(attempt) = attempt else {
            return Err(QueueError::NotFound(job_id.to_string()));
        };

        if attempt >= MAX_ATTEMPTS {
            let idempotency_key: Option<String> =
                conn.hget(&job_key, "idempotency_key").await.map_err(QueueError::Redis)?;
            let now_ms = chrono::Utc::now().timestamp_millis();
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.hset_multiple(
                self.dead_record_key(queue, job_id),
                &[("error", error), ("failed_at", &now_ms.to_string())],
            );
            pipe.zadd(self.dead_set_key(queue), job_id.to_string(), now_ms as f64);
            pipe.zrem(self.active_set_key(queue), job_id.to_string());
            pipe.del(&job_key);
            if let Some(key) = &idempotency_key {
                pipe.del(self.idempotency_key(queue, key));
            }
            pipe.query_async::<()>(&mut conn).await.map_err(QueueError::Redis)?;
            tracing::warn!(%job_id, attempt, error, "job exhausted retry budget; dead-lettered");
            return Ok(FailOutcome::DeadLettered);
        }

        let delay_ms = backoff_delay_ms(attempt);
        let next_run_ms = chrono::Utc::now().timestamp_millis() + delay_ms;
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.zadd(self.pending_key(queue), job_id.to_string(), next_run_ms as f64);
        pipe.zrem(self.active_set_key(queue), job_id.to_string());
        pipe.query_async::<()>(&mut conn).await.map_err(QueueError::Redis)?;
        tracing::warn!(%job_id, attempt, delay_ms, error, "job failed; requeued with backoff");
        Ok(FailOutcome::Retrying { attempt })
    }

    async fn apply_retention(&self, queue: QueueName, max_age_secs: u64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let cutoff_ms = chrono::Utc::now().timestamp_millis() - (max_age_secs as i64 * 1_000);
        let mut removed = 0u64;

        let retention_sets: [(String, fn(&Self, QueueName, JobId) -> String); 2] = [
            (self.completed_set_key(queue), Self::completed_record_key),
            (self.dead_set_key(queue), Self::dead_record_key),
        ];
        for (set_key, record_key_fn) in retention_sets {
            let stale: Vec<String> = conn
                .zrangebyscore(&set_key, 0, cutoff_ms as f64)
                .await
                .map_err(QueueError::Redis)?;
            for id_str in &stale {
                if let Ok(uuid) = id_str.parse() {
                    let _: () = conn.del(record_key_fn(self, queue, JobId(uuid))).await.map_err(QueueError::Redis)?;
                }
            }
            if !stale.is_empty() {
                let removed_from_set: u64 =
                    conn.zrem(&set_key, &stale).await.map_err(QueueError::Redis)?;
                removed += removed_from_set;
            }
        }

        Ok(removed)
    }

    async fn depths(&self, queue: QueueName) -> Result<QueueDepths> {
        let mut conn = self.conn.clone();
        let now_ms = chrono::Utc::now().timestamp_millis() as f64;

        let waiting: u64 = conn
            .zcount(self.pending_key(queue), f64::NEG_INFINITY, now_ms)
            .await
            .map_err(QueueError::Redis)?;
        let delayed: u64 = conn
            .zcount(self.pending_key(queue), format!("({now_ms}"), "+inf".to_string())
            .await
            .map_err(QueueError::Redis)?;
        let active: u64 = conn.zcard(self.active_set_key(queue)).await.map_err(QueueError::Redis)?;
        let failed: u64 = conn.zcard(self.dead_set_key(queue)).await.map_err(QueueError::Redis)?;

        Ok(QueueDepths { waiting, active, delayed, failed })
    }
}
