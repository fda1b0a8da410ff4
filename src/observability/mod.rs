// Observability configuration
pub mod config;

// Latency metrics: sink abstraction and the two backends
pub mod metrics;

// Structured logging
pub mod logging;

// Distributed tracing and context propagation
pub mod tracing;

pub use self::config::{LogConfig, LogFormat, MetricsConfig, ObservabilityConfig, TracingConfig};
pub use self::logging::init_logging;
pub use self::metrics::{DualMetricsSink, LatencyBackend, MetricsPipeline, MetricsSink, RecordingSink};
pub use self::tracing::NodeTracer;
