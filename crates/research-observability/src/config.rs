//! Tracing configuration builder.

use serde::{Deserialize, Serialize};

/// Context propagation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PropagatorType {
    #[default]
    TraceContext,
    Jaeger,
    B3,
    XRay,
}

/// Sampling strategy for span collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum SamplingStrategy {
    #[default]
    Always,
    Never,
    Probabilistic(f64),
    ParentBased { root: Box<SamplingStrategy> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
    pub sampling: SamplingStrategy,
    pub propagator: PropagatorType,
    pub enable_stdout: bool,
    pub resource_attributes: Vec<(String, String)>,
}

impl TracingConfig {
    /// Defaults: service name `research-execution-core`, sampling `Always`,
    /// no OTLP endpoint, stdout exporter off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            service_name: "research-execution-core".to_string(),
            otlp_endpoint: None,
            sampling: SamplingStrategy::Always,
            propagator: PropagatorType::TraceContext,
            enable_stdout: false,
            resource_attributes: Vec::new(),
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling = if rate >= 1.0 {
            SamplingStrategy::Always
        } else if rate <= 0.0 {
            SamplingStrategy::Never
        } else {
            SamplingStrategy::Probabilistic(rate)
        };
        self
    }

    #[must_use]
    pub fn with_sampling_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.sampling = strategy;
        self
    }

    #[must_use]
    pub fn with_propagator(mut self, propagator: PropagatorType) -> Self {
        self.propagator = propagator;
        self
    }

    #[must_use]
    pub fn with_stdout(mut self, enabled: bool) -> Self {
        self.enable_stdout = enabled;
        self
    }

    pub fn with_resource_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_attributes.push((key.into(), value.into()));
        self
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_names_this_service() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "research-execution-core");
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.sampling, SamplingStrategy::Always);
        assert!(!config.enable_stdout);
    }

    #[test]
    fn builder_pattern_chains() {
        let config = TracingConfig::new()
            .with_service_name("research-scheduler")
            .with_otlp_endpoint("http://localhost:4317")
            .with_sampling_rate(0.5)
            .with_stdout(true)
            .with_resource_attribute("env", "production");

        assert_eq!(config.service_name, "research-scheduler");
        assert_eq!(config.otlp_endpoint, Some("http://localhost:4317".to_string()));
        assert_eq!(config.sampling, SamplingStrategy::Probabilistic(0.5));
        assert!(config.enable_stdout);
        assert_eq!(config.resource_attributes.len(), 1);
    }

    #[test]
    fn sampling_rate_clamps_at_the_boundaries() {
        assert_eq!(TracingConfig::new().with_sampling_rate(1.5).sampling, SamplingStrategy::Always);
        assert_eq!(TracingConfig::new().with_sampling_rate(-0.5).sampling, SamplingStrategy::Never);
        assert_eq!(
            TracingConfig::new().with_sampling_rate(0.75).sampling,
            SamplingStrategy::Probabilistic(0.75)
        );
    }
}
