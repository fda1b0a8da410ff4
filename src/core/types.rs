//! # Core Types
//!
//! Data structures shared by the registry, the peer caller, the orchestrator
//! and the metrics sink.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One downstream node reachable over HTTP.
///
/// Built once at startup from the peer list and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub address: String,
    pub port: u16,
}

impl Peer {
    pub fn new<S: Into<String>>(address: S, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Base URL of the peer's internal processing endpoint.
    pub fn internal_url(&self) -> String {
        format!("http://{}:{}/api/internal", self.address, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{addr={},port={}}}", self.address, self.port)
    }
}

/// Result of exactly one peer call. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure(String),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success)
    }
}

/// Which timed segment a measurement covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Workload simulation alone
    InternalOnly,
    /// Peer fan-out plus workload
    Total,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::InternalOnly => "internal-only",
            Phase::Total => "total",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status label attached to a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            Status::Ok
        } else {
            Status::Error
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed timed segment, handed to the metrics sink immediately and
/// not retained afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMeasurement {
    pub phase: Phase,
    pub status: Status,
    pub duration_seconds: f64,
    pub instance_id: String,
}

impl LatencyMeasurement {
    pub fn new<S: Into<String>>(phase: Phase, status: Status, elapsed: Duration, instance_id: S) -> Self {
        Self {
            phase,
            status,
            duration_seconds: elapsed.as_secs_f64(),
            instance_id: instance_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_internal_url() {
        let peer = Peer::new("service-b", 8080);
        assert_eq!(peer.internal_url(), "http://service-b:8080/api/internal");
        assert_eq!(peer.to_string(), "{addr=service-b,port=8080}");
    }

    #[test]
    fn test_label_values() {
        assert_eq!(Phase::InternalOnly.as_str(), "internal-only");
        assert_eq!(Phase::Total.as_str(), "total");
        assert_eq!(Status::from_success(true), Status::Ok);
        assert_eq!(Status::from_success(false).as_str(), "ERROR");
    }

    #[test]
    fn test_measurement_duration_in_seconds() {
        let m = LatencyMeasurement::new(Phase::Total, Status::Ok, Duration::from_millis(1500), "id");
        assert!((m.duration_seconds - 1.5).abs() < f64::EPSILON);
        assert_eq!(m.instance_id, "id");
    }
}
