//! # Configuration Module
//!
//! Node configuration with layered sources:
//! built-in defaults, an optional YAML file, then environment variables.
//!
//! ## Environment Variables
//! - `APP_NAME`: local service identity (required)
//! - `SERVICES_TO_CALL`: comma-separated `address:port` peer list
//! - `OTEL_AGENT`: OTLP collector endpoint for traces and metrics
//! - `NODE_*`: server, workload and observability overrides (see [`NodeConfig::apply_env_overrides`])

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::error::{NodeError, NodeResult};
use crate::observability::config::{LogFormat, ObservabilityConfig};

/// Environment variable pointing at an optional YAML configuration file
pub const CONFIG_PATH_ENV: &str = "NODE_CONFIG_PATH";

/// Complete configuration for one node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Local service identity. Used for metric names, complexity lookups and
    /// self-call filtering.
    pub identity: String,

    /// Listener configuration
    pub server: ServerConfig,

    /// Downstream peers
    pub peers: PeerListConfig,

    /// Workload simulation settings
    pub workload: WorkloadConfig,

    /// Observability settings (logging, metrics, tracing)
    pub observability: ObservabilityConfig,
}

impl NodeConfig {
    /// Load configuration from `NODE_CONFIG_PATH` if set, then apply the
    /// environment and validate.
    pub async fn load() -> NodeResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::read_yaml(&path).await?,
            Err(_) => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, then apply the environment and validate.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> NodeResult<Self> {
        let mut config = Self::read_yaml(path).await?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    async fn read_yaml<P: AsRef<Path>>(path: P) -> NodeResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) -> NodeResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Split out so tests do not
    /// have to mutate the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> NodeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("APP_NAME") {
            self.identity = name;
        }

        if let Some(services) = lookup("SERVICES_TO_CALL") {
            self.peers.services = Some(services);
        }

        if let Some(agent) = lookup("OTEL_AGENT") {
            if !agent.trim().is_empty() {
                self.observability.otlp_endpoint = Some(agent);
            }
        }

        if let Some(addr) = lookup("NODE_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(port) = lookup("NODE_HTTP_PORT") {
            self.server.http_port = port
                .parse()
                .map_err(|e| NodeError::config(format!("Invalid NODE_HTTP_PORT: {}", e)))?;
        }

        if let Some(port) = lookup("NODE_METRICS_PORT") {
            self.server.metrics_port = port
                .parse()
                .map_err(|e| NodeError::config(format!("Invalid NODE_METRICS_PORT: {}", e)))?;
        }

        if let Some(timeout) = lookup("NODE_PEER_TIMEOUT") {
            self.peers.call_timeout = humantime::parse_duration(&timeout)
                .map_err(|e| NodeError::config(format!("Invalid NODE_PEER_TIMEOUT: {}", e)))?;
        }

        if let Some(strict) = lookup("NODE_STRICT_PEER_STATUS") {
            self.peers.strict_status = strict
                .parse()
                .map_err(|e| NodeError::config(format!("Invalid NODE_STRICT_PEER_STATUS: {}", e)))?;
        }

        if let Some(intensity) = lookup("NODE_DEFAULT_INTENSITY") {
            self.workload.default_intensity = intensity
                .parse()
                .map_err(|e| NodeError::config(format!("Invalid NODE_DEFAULT_INTENSITY: {}", e)))?;
        }

        if let Some(format) = lookup("NODE_LOG_FORMAT") {
            self.observability.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => return Err(NodeError::config(format!("Invalid NODE_LOG_FORMAT: {}", other))),
            };
        }

        if let Some(level) = lookup("NODE_LOG_LEVEL") {
            self.observability.logging.level = level;
        }

        if let Some(rate) = lookup("NODE_TRACING_SAMPLE_RATE") {
            self.observability.tracing.sample_rate = rate
                .parse()
                .map_err(|e| NodeError::config(format!("Invalid NODE_TRACING_SAMPLE_RATE: {}", e)))?;
        }

        if let Some(interval) = lookup("NODE_METRICS_EXPORT_INTERVAL") {
            self.observability.metrics.export_interval = humantime::parse_duration(&interval)
                .map_err(|e| NodeError::config(format!("Invalid NODE_METRICS_EXPORT_INTERVAL: {}", e)))?;
        }

        Ok(())
    }

    /// Configuration validation, reporting every violation at once
    pub fn validate(&self) -> NodeResult<()> {
        let mut errors = Vec::new();

        if self.identity.trim().is_empty() {
            errors.push("APP_NAME not set: node identity is required".to_string());
        }

        if self.server.bind_address.is_empty() {
            errors.push("bind_address cannot be empty".to_string());
        }

        if self.server.http_port == 0 {
            errors.push("http_port must be greater than 0".to_string());
        }

        if self.server.metrics_port == 0 {
            errors.push("metrics_port must be greater than 0".to_string());
        }

        if self.server.http_port == self.server.metrics_port {
            errors.push(format!(
                "http_port and metrics_port must differ, both are {}",
                self.server.http_port
            ));
        }

        if self.peers.call_timeout.is_zero() {
            errors.push("peer call_timeout must be greater than 0".to_string());
        }

        if self.workload.default_intensity == 0 {
            errors.push("default_intensity must be greater than 0".to_string());
        }

        match self.observability.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.observability.logging.level)),
        }

        let rate = self.observability.tracing.sample_rate;
        if !(0.0..=1.0).contains(&rate) {
            errors.push(format!(
                "Tracing sample_rate must be between 0.0 and 1.0, got: {}",
                rate
            ));
        }

        if self.observability.metrics.export_interval.is_zero() {
            errors.push("metrics export_interval must be greater than 0".to_string());
        }

        if !errors.is_empty() {
            return Err(NodeError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }

    /// Metric name shared by both backends
    pub fn metric_name(&self) -> String {
        format!("{}_operation_latency", self.identity.replace(' ', "_"))
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for both listeners
    pub bind_address: String,

    /// Port serving `/api/*`
    pub http_port: u16,

    /// Port serving the Prometheus `/metrics` scrape endpoint
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            metrics_port: 9000,
        }
    }
}

/// Peer list and call policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerListConfig {
    /// Raw `address:port,address:port` list
    pub services: Option<String>,

    /// Deadline for a single peer call
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,

    /// Count non-2xx peer responses as failures
    pub strict_status: bool,
}

impl Default for PeerListConfig {
    fn default() -> Self {
        Self {
            services: None,
            call_timeout: Duration::from_secs(10),
            strict_status: false,
        }
    }
}

/// Workload simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Intensity used when the request's complexity config has no entry for this node
    pub default_intensity: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            default_intensity: crate::workload::DEFAULT_INTENSITY,
        }
    }
}
