//! OpenTelemetry tracing subscriber initialization.

use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{PropagatorType, SamplingStrategy, TracingConfig};
use crate::error::{Error, Result};

/// Sets up the global tracer provider and installs a `tracing_subscriber`
/// registry combining an env filter, an OpenTelemetry layer, and an fmt
/// layer. Every worker binary calls this once at startup.
pub async fn init_tracing(config: TracingConfig) -> Result<()> {
    let mut resource_kvs = vec![KeyValue::new("service.name", config.service_name.clone())];
    for (key, value) in config.resource_attributes {
        resource_kvs.push(KeyValue::new(key, value));
    }
    let resource = Resource::builder_empty().with_attributes(resource_kvs).build();

    let sampler = sampler_from_strategy(&config.sampling);

    let mut provider_builder = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler);

    if let Some(endpoint) = config.otlp_endpoint {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .build()
            .map_err(|e| Error::ExporterConnection(e.to_string()))?;
        provider_builder = provider_builder.with_batch_exporter(exporter);
    }

    if config.enable_stdout {
        provider_builder = provider_builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default());
    }

    let provider = provider_builder.build();
    global::set_tracer_provider(provider);

    // Every propagator type resolves to W3C TraceContext + Baggage here: a
    // native Jaeger/B3/X-Ray propagator would need its own crate, and
    // nothing downstream distinguishes them yet.
    let propagator = match config.propagator {
        PropagatorType::TraceContext | PropagatorType::Jaeger | PropagatorType::B3 | PropagatorType::XRay => {
            TextMapCompositePropagator::new(vec![
                Box::new(TraceContextPropagator::new()),
                Box::new(BaggagePropagator::new()),
            ])
        }
    };
    global::set_text_map_propagator(propagator);

    let tracer = global::tracer("research-execution-core");
    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry_layer)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Initialization(e.to_string()))?;

    Ok(())
}

fn sampler_from_strategy(strategy: &SamplingStrategy) -> Sampler {
    match strategy {
        SamplingStrategy::Always => Sampler::AlwaysOn,
        SamplingStrategy::Never => Sampler::AlwaysOff,
        SamplingStrategy::Probabilistic(rate) => Sampler::TraceIdRatioBased(*rate),
        SamplingStrategy::ParentBased { root } => Sampler::ParentBased(Box::new(sampler_from_strategy(root))),
    }
}

/// OTel v0.31+ shuts the tracer provider down on drop. This is a marker for
/// call sites that want an explicit place to flush before process exit.
pub fn shutdown_tracing() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_based_sampler_recurses_into_its_root() {
        let strategy = SamplingStrategy::ParentBased { root: Box::new(SamplingStrategy::Never) };
        assert!(matches!(sampler_from_strategy(&strategy), Sampler::ParentBased(_)));
    }

    #[tokio::test]
    async fn init_tracing_with_stdout_does_not_panic() {
        let config = TracingConfig::new().with_service_name("test-service").with_stdout(true);
        let _ = init_tracing(config).await;
    }
}
