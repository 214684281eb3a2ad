//! Tracing/metrics initialization and admin health aggregation (§6.3) for
//! the research execution core.

pub mod config;
pub mod error;
pub mod exporter;
pub mod health;
pub mod heartbeat;
pub mod metrics;
pub mod metrics_server;

pub use config::{PropagatorType, SamplingStrategy, TracingConfig};
pub use error::{Error, Result};
pub use exporter::{init_tracing, shutdown_tracing};
pub use health::{aggregate as aggregate_health, HealthReport, QueueHealth, QueuesHealth, WorkerHealth};
pub use heartbeat::WorkerKind;
pub use metrics::ResearchMetrics;
pub use metrics_server::{serve_metrics, serve_metrics_with_addr};
