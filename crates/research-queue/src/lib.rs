//! Job queue broker (§3 Job, §4.G enqueue idempotence): research and
//! delivery queues backed by Redis, with worker-level retry/backoff and
//! age-based retention for completed and dead-lettered jobs.

pub mod broker;
pub mod error;
pub mod redis_queue;

pub use broker::{EnqueueOutcome, FailOutcome, JobQueue, QueueDepths, QueueName, QueuedJob};
pub use error::QueueError;
pub use redis_queue::RedisQueue;
