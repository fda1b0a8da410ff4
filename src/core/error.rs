//! # Error Handling Module
//!
//! Error types for the telemetry node, built on `thiserror`.
//!
//! Two families of errors flow through the node:
//! - **Fatal/startup** errors (bad configuration, backend bootstrap failures) are
//!   returned from `main` and stop the process before it starts serving.
//! - **Recoverable** errors (peer transport failures, timeouts) are converted into
//!   [`CallOutcome::Failure`](crate::core::types::CallOutcome) by the peer caller
//!   and never escape the orchestrator.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the node
pub type NodeResult<T> = Result<T, NodeError>;

/// Error types for the telemetry node
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// Configuration-related errors (missing identity, malformed peer list, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The workload simulator was asked to run with an intensity it cannot honor
    #[error("Invalid workload intensity: {intensity}")]
    InvalidIntensity { intensity: u64 },

    /// Outbound call exceeded its deadline
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A metrics backend refused a measurement
    #[error("Metrics backend '{backend}' error: {message}")]
    Metrics { backend: String, message: String },

    /// Tracing or metrics SDK bootstrap failures
    #[error("Telemetry error: {message}")]
    Telemetry { message: String },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (file operations, socket binding, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// HTTP client errors when making peer requests
    #[error("HTTP client error: {message}")]
    HttpClient { message: String },
}

impl NodeError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a metrics backend error
    pub fn metrics<B: Into<String>, M: Into<String>>(backend: B, message: M) -> Self {
        Self::Metrics {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a telemetry bootstrap error
    pub fn telemetry<S: Into<String>>(message: S) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::HttpClient { .. } => StatusCode::BAD_GATEWAY,
            Self::InvalidIntensity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metrics { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Telemetry { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::InvalidIntensity { .. } => "invalid_intensity",
            Self::Timeout { .. } => "timeout",
            Self::Metrics { .. } => "metrics_error",
            Self::Telemetry { .. } => "telemetry_error",
            Self::Internal { .. } => "internal_error",
            Self::Io { .. } => "io_error",
            Self::Yaml { .. } => "yaml_error",
            Self::HttpClient { .. } => "http_client_error",
        }
    }
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for NodeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpClient {
            message: err.to_string(),
        }
    }
}

/// Renders unexpected handler failures as a structured JSON body.
///
/// The peer-failure path does not go through here: it keeps its plain
/// `500 "ERROR"` response.
impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status, Json(error_response)).into_response()
    }
}
