//! # Structured Logging
//!
//! Installs the global `tracing` subscriber: a JSON (or text) formatter, an
//! `EnvFilter` and, when a tracer is supplied, the OpenTelemetry bridge layer.

use opentelemetry_sdk::trace::Tracer;
use tracing::info;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::core::error::{NodeError, NodeResult};
use crate::observability::config::{LogConfig, LogFormat};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_logging(config: &LogConfig, tracer: Option<Tracer>) -> NodeResult<()> {
    let filter = env_filter(&config.level)?;

    let fmt_layer: BoxedLayer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
    };

    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .with(otel_layer)
        .try_init()
        .map_err(|e| NodeError::telemetry(format!("Failed to install tracing subscriber: {}", e)))?;

    info!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

fn env_filter(level: &str) -> NodeResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| NodeError::config(format!("Invalid log level '{}': {}", level, e))),
    }
}
