use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: env filter, JSON fmt output and, when an
/// OTLP endpoint is configured, span export to the collector.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing(service_name: &str, log_level: &str, otlp_endpoint: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let mut export_error = None;
    let telemetry = match otlp_endpoint.filter(|e| !e.is_empty()) {
        Some(endpoint) => {
            let otlp_exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint);

            match opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(otlp_exporter)
                .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", service_name.to_string()),
                ])))
                .install_batch(runtime::Tokio)
            {
                Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Err(e) => {
                    export_error = Some((endpoint, e));
                    None
                }
            }
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .try_init()
        .ok();

    if let Some((endpoint, e)) = export_error {
        tracing::warn!(
            service = service_name,
            endpoint = endpoint,
            error = %e,
            "OTLP exporter unavailable, logging locally only"
        );
    }
}
