//! Worker liveness, backed by the same cache store §4.A already wires up.
//! Each worker loop calls `beat` once per iteration; the admin health
//! endpoint calls `is_alive` to decide `workers.{research,delivery}`.

use std::fmt;

use research_cache::CacheStore;

/// TTL on a heartbeat key. A worker that stalls for longer than this
/// between loop iterations reads as dead, which is intentional: a
/// healthy research/delivery loop dequeues (or polls and finds nothing)
/// far more often than this.
const HEARTBEAT_TTL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Research,
    Delivery,
    Scheduler,
    Reconciler,
}

impl WorkerKind {
    fn as_str(self) -> &'static str {
        match self {
            WorkerKind::Research => "research",
            WorkerKind::Delivery => "delivery",
            WorkerKind::Scheduler => "scheduler",
            WorkerKind::Reconciler => "reconciler",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn heartbeat_key(kind: WorkerKind) -> String {
    format!("research:heartbeat:{}", kind.as_str())
}

/// Records that `kind`'s loop is alive right now.
pub async fn beat(store: &CacheStore, kind: WorkerKind) {
    let marker = serde_json::Value::Bool(true);
    store.set(&heartbeat_key(kind), &marker, HEARTBEAT_TTL_SECS).await;
}

/// Whether `kind` has beaten within the last [`HEARTBEAT_TTL_SECS`].
pub async fn is_alive(store: &CacheStore, kind: WorkerKind) -> bool {
    store.exists(&heartbeat_key(kind)).await
}
