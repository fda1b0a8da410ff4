use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// OTLP/gRPC collector endpoint shared by trace and metric export.
    /// `None` keeps spans and OpenTelemetry metrics in-process.
    pub otlp_endpoint: Option<String>,
    pub metrics: MetricsConfig,
    pub logging: LogConfig,
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub sample_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Push interval of the OpenTelemetry periodic reader
    #[serde(with = "humantime_serde")]
    pub export_interval: Duration,

    /// Histogram bucket boundaries, in seconds, used by both backends
    pub latency_buckets: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { sample_rate: 1.0 }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            export_interval: Duration::from_secs(5),
            latency_buckets: exponential_buckets(0.01, 1.8, 20),
        }
    }
}

/// `count` bucket bounds starting at `start`, each `factor` times the previous.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    let mut buckets = Vec::with_capacity(count);
    let mut bound = start;
    for _ in 0..count {
        buckets.push(bound);
        bound *= factor;
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_buckets() {
        let buckets = exponential_buckets(0.01, 1.8, 20);
        assert_eq!(buckets.len(), 20);
        assert!((buckets[0] - 0.01).abs() < 1e-12);
        assert!((buckets[1] - 0.018).abs() < 1e-12);
        assert!(buckets.windows(2).all(|w| w[0] < w[1]));
    }
}
