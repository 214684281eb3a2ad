//! Admin health aggregation (§6.3): `GET /admin/queue/health` →
//! `{healthy, redis, workers:{research,delivery}, queues:{research:{...},
//! delivery:{...}}}`; 200 if healthy, 503 otherwise.

use std::sync::Arc;

use serde::Serialize;

use research_cache::CacheStore;
use research_queue::{JobQueue, QueueDepths, QueueName};

use crate::heartbeat::{self, WorkerKind};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueHealth {
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
    pub failed: u64,
}

impl From<QueueDepths> for QueueHealth {
    fn from(depths: QueueDepths) -> Self {
        Self { waiting: depths.waiting, active: depths.active, delayed: depths.delayed, failed: depths.failed }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorkerHealth {
    pub research: bool,
    pub delivery: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub redis: bool,
    pub workers: WorkerHealth,
    pub queues: QueuesHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuesHealth {
    pub research: QueueHealth,
    pub delivery: QueueHealth,
}

/// Healthy means: redis reachable, both worker heartbeats fresh, and
/// neither queue's failed count has climbed above zero. The reconciler is
/// the mechanism that would otherwise let a silently-dead-lettered backlog
/// go unnoticed, so a nonzero `failed` count is treated as unhealthy here
/// rather than as something only visible on the next scrape.
pub async fn aggregate(cache: &CacheStore, queue: &Arc<dyn JobQueue>) -> HealthReport {
    let redis = cache.ping().await;
    let research_alive = heartbeat::is_alive(cache, WorkerKind::Research).await;
    let delivery_alive = heartbeat::is_alive(cache, WorkerKind::Delivery).await;

    let research_depths = queue.depths(QueueName::Research).await.unwrap_or_default();
    let delivery_depths = queue.depths(QueueName::Delivery).await.unwrap_or_default();

    let healthy =
        redis && research_alive && delivery_alive && research_depths.failed == 0 && delivery_depths.failed == 0;

    HealthReport {
        healthy,
        redis,
        workers: WorkerHealth { research: research_alive, delivery: delivery_alive },
        queues: QueuesHealth { research: research_depths.into(), delivery: delivery_depths.into() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_health_converts_from_depths() {
        let depths = QueueDepths { waiting: 2, active: 1, delayed: 0, failed: 3 };
        let health: QueueHealth = depths.into();
        assert_eq!(health.waiting, 2);
        assert_eq!(health.active, 1);
        assert_eq!(health.failed, 3);
    }
}
