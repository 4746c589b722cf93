// Structured logging, OpenTelemetry tracing and Prometheus metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "scheduler-orchestrator";

pub const JOBS_CREATED: &str = "scheduler_jobs_created_total";
pub const JOBS_REMOVED: &str = "scheduler_jobs_removed_total";
pub const TRIGGERS_SCHEDULED: &str = "scheduler_triggers_scheduled_total";
pub const TRIGGERS_REMOVED: &str = "scheduler_triggers_removed_total";
pub const TRIGGER_FIRES: &str = "scheduler_trigger_fires_total";
pub const JOB_EXECUTIONS_FAILED: &str = "scheduler_job_executions_failed_total";
pub const OPERATION_ERRORS: &str = "scheduler_operation_errors_total";
pub const ACTIVE_TRIGGERS: &str = "scheduler_active_triggers";

/// Install the global subscriber: JSON logs filtered by `RUST_LOG` (falling back to
/// `log_level`), plus an OTLP span exporter when `tracing_endpoint` is set
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");
    Ok(tracer)
}

/// Flush remaining spans on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Install the Prometheus recorder and describe every scheduler metric.
///
/// The returned handle renders the exposition text; the API serves it at `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(JOBS_CREATED, "Jobs created through the orchestrator");
    describe_counter!(JOBS_REMOVED, "Jobs removed through the orchestrator");
    describe_counter!(TRIGGERS_SCHEDULED, "Triggers scheduled, by trigger kind");
    describe_counter!(TRIGGERS_REMOVED, "Triggers removed, including cascades");
    describe_counter!(TRIGGER_FIRES, "Trigger fires dispatched by the engine");
    describe_counter!(JOB_EXECUTIONS_FAILED, "Job executions that returned an error");
    describe_counter!(
        OPERATION_ERRORS,
        "Failed orchestrator operations, by operation and error kind"
    );
    describe_gauge!(ACTIVE_TRIGGERS, "Triggers currently in the normal state");

    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

#[inline]
pub fn record_job_created() {
    counter!(JOBS_CREATED).increment(1);
}

#[inline]
pub fn record_job_removed() {
    counter!(JOBS_REMOVED).increment(1);
}

#[inline]
pub fn record_trigger_scheduled(kind: &'static str) {
    counter!(TRIGGERS_SCHEDULED, "kind" => kind).increment(1);
}

#[inline]
pub fn record_trigger_removed() {
    counter!(TRIGGERS_REMOVED).increment(1);
}

#[inline]
pub fn record_trigger_fire(job_group: &str) {
    counter!(TRIGGER_FIRES, "job_group" => job_group.to_string()).increment(1);
}

#[inline]
pub fn record_job_execution_failed(job_group: &str) {
    counter!(JOB_EXECUTIONS_FAILED, "job_group" => job_group.to_string()).increment(1);
}

#[inline]
pub fn record_operation_error(operation: &'static str, kind: &'static str) {
    counter!(OPERATION_ERRORS, "operation" => operation, "kind" => kind).increment(1);
}

#[inline]
pub fn set_active_triggers(count: usize) {
    gauge!(ACTIVE_TRIGGERS).set(count as f64);
}
