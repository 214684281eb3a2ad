//! Prometheus metrics for the research execution core: pipeline runs,
//! search/email vendor calls, and queue depths.

use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};

const PIPELINE_DURATION_BUCKETS: &[f64] = &[1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];
const VENDOR_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// A Prometheus registry plus the metric families this crate's workers
/// record against. Cloning shares the underlying registry and metrics.
#[derive(Clone)]
pub struct ResearchMetrics {
    pub registry: Registry,

    /// Research pipeline runs by outcome (completed, skipped, failed).
    pub pipeline_runs_total: IntCounterVec,
    /// Research pipeline wall-clock duration in seconds.
    pub pipeline_duration_seconds: Histogram,

    /// Search provider calls by provider name and outcome (ok, error).
    pub search_requests_total: IntCounterVec,
    /// Search provider call latency in seconds, by provider name.
    pub search_latency_seconds: HistogramVec,

    /// Email sends by outcome (ok, rejected, error).
    pub email_sends_total: IntCounterVec,

    /// Jobs re-queued after failure, by queue name.
    pub job_retries_total: IntCounterVec,
    /// Jobs dead-lettered after exhausting their attempt budget, by queue.
    pub jobs_dead_lettered_total: IntCounterVec,

    /// Current queue depth by queue name and state (waiting, active,
    /// delayed, failed) — set from `JobQueue::depths` on each health poll.
    pub queue_depth: IntGaugeVec,
}

impl ResearchMetrics {
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Result<Self> {
        let namespace = "research";

        let pipeline_runs_total = IntCounterVec::new(
            Opts::new("pipeline_runs_total", "Research pipeline runs by outcome").namespace(namespace),
            &["outcome"],
        )
        .map_err(prometheus_err)?;

        let pipeline_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("pipeline_duration_seconds", "Research pipeline wall-clock duration")
                .namespace(namespace)
                .buckets(PIPELINE_DURATION_BUCKETS.to_vec()),
        )
        .map_err(prometheus_err)?;

        let search_requests_total = IntCounterVec::new(
            Opts::new("search_requests_total", "Search provider calls by provider and outcome").namespace(namespace),
            &["provider", "outcome"],
        )
        .map_err(prometheus_err)?;

        let search_latency_seconds = HistogramVec::new(
            HistogramOpts::new("search_latency_seconds", "Search provider call latency")
                .namespace(namespace)
                .buckets(VENDOR_LATENCY_BUCKETS.to_vec()),
            &["provider"],
        )
        .map_err(prometheus_err)?;

        let email_sends_total = IntCounterVec::new(
            Opts::new("email_sends_total", "Email sends by outcome").namespace(namespace),
            &["outcome"],
        )
        .map_err(prometheus_err)?;

        let job_retries_total = IntCounterVec::new(
            Opts::new("job_retries_total", "Jobs requeued after failure, by queue").namespace(namespace),
            &["queue"],
        )
        .map_err(prometheus_err)?;

        let jobs_dead_lettered_total = IntCounterVec::new(
            Opts::new("jobs_dead_lettered_total", "Jobs dead-lettered, by queue").namespace(namespace),
            &["queue"],
        )
        .map_err(prometheus_err)?;

        let queue_depth = IntGaugeVec::new(
            Opts::new("queue_depth", "Queue depth by queue and state").namespace(namespace),
            &["queue", "state"],
        )
        .map_err(prometheus_err)?;

        for collector in [
            Box::new(pipeline_runs_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(pipeline_duration_seconds.clone()),
            Box::new(search_requests_total.clone()),
            Box::new(search_latency_seconds.clone()),
            Box::new(email_sends_total.clone()),
            Box::new(job_retries_total.clone()),
            Box::new(jobs_dead_lettered_total.clone()),
            Box::new(queue_depth.clone()),
        ] {
            registry.register(collector).map_err(prometheus_err)?;
        }

        Ok(Self {
            registry,
            pipeline_runs_total,
            pipeline_duration_seconds,
            search_requests_total,
            search_latency_seconds,
            email_sends_total,
            job_retries_total,
            jobs_dead_lettered_total,
            queue_depth,
        })
    }

    /// Renders every registered metric family in Prometheus text exposition
    /// format for the `/metrics` scrape endpoint.
    pub fn export(&self) -> Result<String> {
        let families = self.registry.gather();
        TextEncoder::new()
            .encode_to_string(&families)
            .map_err(|e| Error::Metrics(e.to_string()))
    }
}

fn prometheus_err(err: prometheus::Error) -> Error {
    Error::Metrics(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_exports_without_error() {
        let metrics = ResearchMetrics::new().unwrap();
        metrics.pipeline_runs_total.with_label_values(&["completed"]).inc();
        let exported = metrics.export().unwrap();
        assert!(exported.contains("research_pipeline_runs_total"));
    }

    #[test]
    fn queue_depth_gauge_tracks_labels_independently() {
        let metrics = ResearchMetrics::new().unwrap();
        metrics.queue_depth.with_label_values(&["research", "waiting"]).set(3);
        metrics.queue_depth.with_label_values(&["delivery", "failed"]).set(1);
        assert_eq!(metrics.queue_depth.with_label_values(&["research", "waiting"]).get(), 3);
        assert_eq!(metrics.queue_depth.with_label_values(&["delivery", "failed"]).get(), 1);
    }
}
