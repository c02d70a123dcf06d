//! OpenTelemetry integration for congress-sync
//!
//! This module provides observability through OpenTelemetry, including
//! tracing, sync metrics, and optional export to OTLP endpoints.

use crate::config::{LoggingConfig, OtelConfig};
use crate::models::{EntityKind, SyncReport, UpsertOutcome};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as _,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Instrumentation scope for spans and metrics
pub const INSTRUMENTATION_SCOPE: &str = "congress_sync";

/// Resource describing this process to the collector
fn sync_resource(config: &OtelConfig) -> Resource {
    Resource::new([
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.namespace", "congress-gov"),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}

/// Trace and metric pipelines for the sync service
///
/// Disabled configs get a meter with no reader, so [`SyncMetrics`] can be
/// recorded unconditionally.
pub struct OtelProvider {
    enabled: bool,
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
}

impl OtelProvider {
    /// Build the pipelines; an enabled config requires an endpoint
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = sync_resource(config);

        if !config.enabled {
            return Ok(Self {
                enabled: false,
                tracer_provider: None,
                meter_provider: SdkMeterProvider::builder().with_resource(resource).build(),
            });
        }

        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| OtelError::Config("OTLP endpoint is required when enabled".into()))?;

        let tracer_provider = otlp_tracer_provider(endpoint, resource.clone())?;
        let meter_provider = otlp_meter_provider(endpoint, resource)?;
        global::set_tracer_provider(tracer_provider.clone());

        Ok(Self {
            enabled: true,
            tracer_provider: Some(tracer_provider),
            meter_provider,
        })
    }

    /// Tracer for the sync pipeline; a no-export tracer when disabled
    pub fn tracer(&self) -> opentelemetry_sdk::trace::Tracer {
        match &self.tracer_provider {
            Some(provider) => provider.versioned_tracer(
                INSTRUMENTATION_SCOPE,
                Some(env!("CARGO_PKG_VERSION")),
                None::<&'static str>,
                None,
            ),
            None => TracerProvider::builder().build().tracer(INSTRUMENTATION_SCOPE),
        }
    }

    /// Meter that [`SyncMetrics`] registers its instruments on
    pub fn meter(&self) -> Meter {
        self.meter_provider.versioned_meter(
            INSTRUMENTATION_SCOPE,
            Some(env!("CARGO_PKG_VERSION")),
            None::<&'static str>,
            None,
        )
    }

    /// Whether spans and metrics are exported
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flush pending spans and stop the meter, reporting every failure
    pub fn shutdown(&self) -> Result<(), OtelError> {
        let mut failures = Vec::new();

        if let Some(provider) = &self.tracer_provider {
            failures.extend(
                provider
                    .force_flush()
                    .into_iter()
                    .filter_map(Result::err)
                    .map(|e| format!("span flush: {}", e)),
            );
        }
        if let Err(e) = self.meter_provider.shutdown() {
            failures.push(format!("meter: {}", e));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OtelError::Shutdown(failures.join("; ")))
        }
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn otlp_tracer_provider(endpoint: &str, resource: Resource) -> Result<TracerProvider, OtelError> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| OtelError::TracerInit(e.to_string()))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(opentelemetry_sdk::trace::Sampler::AlwaysOn)
                .with_resource(resource),
        )
        .build())
}

fn otlp_meter_provider(endpoint: &str, resource: Resource) -> Result<SdkMeterProvider, OtelError> {
    use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
    use opentelemetry_sdk::metrics::reader::{DefaultAggregationSelector, DefaultTemporalitySelector};
    use opentelemetry_sdk::metrics::PeriodicReader;

    let exporter = MetricsExporterBuilder::from(
        opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint),
    )
    .build_metrics_exporter(
        Box::new(DefaultTemporalitySelector::new()),
        Box::new(DefaultAggregationSelector::new()),
    )
    .map_err(|e| OtelError::MeterInit(e.to_string()))?;

    // One export per minute
    let reader = PeriodicReader::builder(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_interval(std::time::Duration::from_secs(60))
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

/// Metrics emitted by the sync pipeline
pub struct SyncMetrics {
    /// Records written, by entity and outcome
    pub records_total: Counter<u64>,

    /// Records that failed to normalize or persist, by entity
    pub record_errors_total: Counter<u64>,

    /// Finished runs, by result
    pub runs_total: Counter<u64>,

    /// Failed page fetches, by entity
    pub page_failures_total: Counter<u64>,

    /// Run duration in seconds
    pub run_duration: Histogram<f64>,
}

impl SyncMetrics {
    /// Create new metrics with the given meter
    pub fn new(meter: &Meter) -> Self {
        let records_total = meter
            .u64_counter("congress_sync_records_total")
            .with_description("Records written to the store")
            .init();

        let record_errors_total = meter
            .u64_counter("congress_sync_record_errors_total")
            .with_description("Records that failed to normalize or persist")
            .init();

        let runs_total = meter
            .u64_counter("congress_sync_runs_total")
            .with_description("Finished sync runs")
            .init();

        let page_failures_total = meter
            .u64_counter("congress_sync_page_failures_total")
            .with_description("Failed page fetches")
            .init();

        let run_duration = meter
            .f64_histogram("congress_sync_run_duration_seconds")
            .with_description("Sync run duration in seconds")
            .init();

        Self {
            records_total,
            record_errors_total,
            runs_total,
            page_failures_total,
            run_duration,
        }
    }

    /// Record a successful upsert
    pub fn record_upsert(&self, entity: EntityKind, outcome: UpsertOutcome) {
        let outcome = match outcome {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        };
        self.records_total.add(
            1,
            &[
                KeyValue::new("entity", entity.to_string()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }

    /// Record an item-level failure
    pub fn record_item_error(&self, entity: EntityKind) {
        self.record_errors_total
            .add(1, &[KeyValue::new("entity", entity.to_string())]);
    }

    /// Record a failed page fetch
    pub fn record_page_failure(&self, entity: EntityKind) {
        self.page_failures_total
            .add(1, &[KeyValue::new("entity", entity.to_string())]);
    }

    /// Record a finished run
    pub fn record_run(&self, report: &SyncReport) {
        let result = if report.success {
            "success"
        } else if report.aborted {
            "aborted"
        } else {
            "stalled"
        };
        self.runs_total
            .add(1, &[KeyValue::new("result", result)]);

        let elapsed = (report.finished_at - report.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.run_duration
            .record(elapsed, &[KeyValue::new("result", result)]);
    }
}

/// Build the log filter: `RUST_LOG` wins over the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    })
}

/// Initialize tracing subscriber with OpenTelemetry integration
pub fn init_tracing(otel: &OtelProvider, logging: &LoggingConfig) -> Result<(), OtelError> {
    let fmt_layer = match logging.format.to_lowercase().as_str() {
        "pretty" => tracing_subscriber::fmt::layer().pretty().boxed(),
        _ => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let otel_layer = otel
        .is_enabled()
        .then(|| tracing_opentelemetry::layer().with_tracer(otel.tracer()));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter(&logging.level))
        .with(otel_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}
