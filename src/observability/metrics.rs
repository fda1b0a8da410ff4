//! # Latency Metrics
//!
//! Every latency measurement is written to two independent backends:
//! - **Prometheus**, through the `metrics` facade and
//!   `metrics-exporter-prometheus`, labelled `type` and `status`;
//! - **OpenTelemetry**, through a meter histogram pushed over OTLP, with
//!   attributes `instance`, `status` and `type`.
//!
//! Request handling only sees the [`MetricsSink`] trait. [`DualMetricsSink`]
//! writes each measurement to both backends and isolates their failures, so
//! the set of `(phase, status)` pairs recorded by one backend always equals
//! the set recorded by the other.
//!
//! ## Usage Example
//! ```rust,ignore
//! let pipeline = MetricsPipeline::install(&config, &instance_id)?;
//! let sink = pipeline.sink();
//! sink.record(&LatencyMeasurement::new(Phase::Total, Status::Ok, elapsed, &instance_id));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::metrics::{Histogram, Meter, MeterProvider as _, Unit};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::reader::{AggregationSelector, DefaultAggregationSelector};
use opentelemetry_sdk::metrics::{Aggregation, InstrumentKind, MeterProvider as SdkMeterProvider};
use opentelemetry_sdk::runtime;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::core::config::NodeConfig;
use crate::core::error::{NodeError, NodeResult};
use crate::core::types::{LatencyMeasurement, Phase, Status};
use crate::observability::tracing::{node_resource, otlp_url};

/// Capability handed to request handling: record one measurement.
pub trait MetricsSink: Send + Sync {
    fn record(&self, measurement: &LatencyMeasurement);
}

/// One metrics backend. A failure here must not affect any other backend.
pub trait LatencyBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn observe(&self, measurement: &LatencyMeasurement) -> NodeResult<()>;
}

/// Writes every measurement to a primary and a secondary backend.
pub struct DualMetricsSink {
    primary: Arc<dyn LatencyBackend>,
    secondary: Arc<dyn LatencyBackend>,
    backend_failures: AtomicU64,
    rejected: AtomicU64,
}

impl DualMetricsSink {
    pub fn new(primary: Arc<dyn LatencyBackend>, secondary: Arc<dyn LatencyBackend>) -> Self {
        Self {
            primary,
            secondary,
            backend_failures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Number of backend writes that failed since startup
    pub fn backend_failures(&self) -> u64 {
        self.backend_failures.load(Ordering::Relaxed)
    }

    /// Measurements refused before reaching either backend
    pub fn rejected_measurements(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn observe_isolated(&self, backend: &dyn LatencyBackend, measurement: &LatencyMeasurement) {
        if let Err(e) = backend.observe(measurement) {
            self.backend_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                backend = backend.name(),
                phase = %measurement.phase,
                status = %measurement.status,
                error = %e,
                "Failed to record latency measurement"
            );
        }
    }
}

impl MetricsSink for DualMetricsSink {
    fn record(&self, measurement: &LatencyMeasurement) {
        // Rejected for both backends or neither
        if !measurement.duration_seconds.is_finite() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            error!(
                phase = %measurement.phase,
                status = %measurement.status,
                duration = measurement.duration_seconds,
                "Refusing non-finite latency measurement"
            );
            return;
        }

        self.observe_isolated(self.primary.as_ref(), measurement);
        self.observe_isolated(self.secondary.as_ref(), measurement);
    }
}

/// Prometheus histogram `{identity}_operation_latency{type, status}`
pub struct PrometheusBackend {
    metric_name: String,
}

impl PrometheusBackend {
    pub fn new<S: Into<String>>(metric_name: S, identity: &str) -> Self {
        let metric_name = metric_name.into();
        metrics::describe_histogram!(
            metric_name.clone(),
            metrics::Unit::Seconds,
            format!("Processing time for {} (native Prometheus metric).", identity)
        );
        Self { metric_name }
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }
}

impl LatencyBackend for PrometheusBackend {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn observe(&self, measurement: &LatencyMeasurement) -> NodeResult<()> {
        metrics::histogram!(
            self.metric_name.clone(),
            "type" => measurement.phase.as_str(),
            "status" => measurement.status.as_str()
        )
        .record(measurement.duration_seconds);
        Ok(())
    }
}

/// OpenTelemetry histogram with `instance`, `status` and `type` attributes
pub struct OpenTelemetryBackend {
    histogram: Histogram<f64>,
}

impl OpenTelemetryBackend {
    pub fn new(meter: &Meter, metric_name: &str, identity: &str) -> Self {
        let histogram = meter
            .f64_histogram(metric_name.to_string())
            .with_description(format!(
                "Processing time for {} (native OpenTelemetry metric).",
                identity
            ))
            .with_unit(Unit::new("s"))
            .init();
        Self { histogram }
    }
}

impl LatencyBackend for OpenTelemetryBackend {
    fn name(&self) -> &'static str {
        "opentelemetry"
    }

    fn observe(&self, measurement: &LatencyMeasurement) -> NodeResult<()> {
        self.histogram.record(
            measurement.duration_seconds,
            &[
                KeyValue::new("instance", measurement.instance_id.clone()),
                KeyValue::new("status", measurement.status.as_str()),
                KeyValue::new("type", measurement.phase.as_str()),
            ],
        );
        Ok(())
    }
}

/// In-memory sink and backend keeping every measurement it receives
#[derive(Default)]
pub struct RecordingSink {
    measurements: Mutex<Vec<LatencyMeasurement>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measurements(&self) -> Vec<LatencyMeasurement> {
        self.measurements.lock().clone()
    }

    /// Recorded `(phase, status)` pairs in arrival order
    pub fn pairs(&self) -> Vec<(Phase, Status)> {
        self.measurements
            .lock()
            .iter()
            .map(|m| (m.phase, m.status))
            .collect()
    }

    pub fn count(&self, phase: Phase, status: Status) -> usize {
        self.measurements
            .lock()
            .iter()
            .filter(|m| m.phase == phase && m.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.measurements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.lock().is_empty()
    }
}

impl MetricsSink for RecordingSink {
    fn record(&self, measurement: &LatencyMeasurement) {
        self.measurements.lock().push(measurement.clone());
    }
}

impl LatencyBackend for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn observe(&self, measurement: &LatencyMeasurement) -> NodeResult<()> {
        self.record(measurement);
        Ok(())
    }
}

/// Explicit bucket boundaries for histograms, SDK defaults for everything else
#[derive(Debug, Clone)]
pub struct LatencyAggregationSelector {
    boundaries: Vec<f64>,
}

impl LatencyAggregationSelector {
    pub fn new(boundaries: Vec<f64>) -> Self {
        Self { boundaries }
    }
}

impl AggregationSelector for LatencyAggregationSelector {
    fn aggregation(&self, kind: InstrumentKind) -> Aggregation {
        match kind {
            InstrumentKind::Histogram => Aggregation::ExplicitBucketHistogram {
                boundaries: self.boundaries.clone(),
                record_min_max: true,
            },
            other => DefaultAggregationSelector::new().aggregation(other),
        }
    }
}

/// Both metrics backends, installed once at startup
pub struct MetricsPipeline {
    prometheus: PrometheusHandle,
    meter_provider: SdkMeterProvider,
    sink: Arc<DualMetricsSink>,
}

impl MetricsPipeline {
    /// Install the Prometheus recorder and the OpenTelemetry meter provider.
    ///
    /// Fails if either backend cannot be initialized; the caller treats
    /// that as fatal.
    pub fn install(config: &NodeConfig, instance_id: &str) -> NodeResult<Self> {
        let metric_name = config.metric_name();
        let buckets = config.observability.metrics.latency_buckets.clone();

        let prometheus = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(metric_name.clone()), &buckets)
            .map_err(|e| NodeError::metrics("prometheus", format!("Failed to set histogram buckets: {}", e)))?
            .install_recorder()
            .map_err(|e| NodeError::metrics("prometheus", e.to_string()))?;

        let meter_provider = build_meter_provider(config, instance_id, buckets)?;
        global::set_meter_provider(meter_provider.clone());
        let meter = meter_provider.meter("telemetry-node");

        let sink = Arc::new(DualMetricsSink::new(
            Arc::new(PrometheusBackend::new(metric_name.clone(), &config.identity)),
            Arc::new(OpenTelemetryBackend::new(&meter, &metric_name, &config.identity)),
        ));

        info!(
            metric = %metric_name,
            otlp_endpoint = ?config.observability.otlp_endpoint,
            export_interval = ?config.observability.metrics.export_interval,
            "Metrics backends initialized"
        );

        Ok(Self {
            prometheus,
            meter_provider,
            sink,
        })
    }

    pub fn sink(&self) -> Arc<DualMetricsSink> {
        Arc::clone(&self.sink)
    }

    pub fn prometheus_handle(&self) -> PrometheusHandle {
        self.prometheus.clone()
    }

    /// Push the final OpenTelemetry batch and stop the periodic reader
    pub fn shutdown(&self) {
        if let Err(e) = self.meter_provider.shutdown() {
            error!(error = %e, "Failed to shut down OpenTelemetry meter provider");
        }
    }
}

fn build_meter_provider(config: &NodeConfig, instance_id: &str, buckets: Vec<f64>) -> NodeResult<SdkMeterProvider> {
    let resource = node_resource(&config.identity, instance_id);

    match &config.observability.otlp_endpoint {
        Some(endpoint) => opentelemetry_otlp::new_pipeline()
            .metrics(runtime::Tokio)
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(otlp_url(endpoint)),
            )
            .with_aggregation_selector(LatencyAggregationSelector::new(buckets))
            .with_period(config.observability.metrics.export_interval)
            .with_resource(resource)
            .build()
            .map_err(|e| NodeError::metrics("opentelemetry", format!("Failed to build OTLP metrics pipeline: {}", e))),
        None => {
            info!("No OTLP endpoint configured, OpenTelemetry metrics are not exported");
            Ok(SdkMeterProvider::builder().with_resource(resource).build())
        }
    }
}
