//! # Telemetry Node Library
//!
//! A synthetic microservice node for exercising distributed tracing and
//! latency metrics pipelines. Many instances run side by side; each one
//! fans out to its configured peers, burns a controllable amount of CPU,
//! and reports per-request latency to Prometheus and OpenTelemetry.
//!
//! ## Request flow
//!
//! ```text
//! GET /api/action?config=A:10,B:20
//!   -> call every peer (except self) at /api/internal, forwarding config
//!   -> run the workload at this node's intensity
//!   -> record "internal-only" and "total" latency
//!   -> 200 "OK" if everything succeeded, else 500 "ERROR"
//! ```

/// Errors, configuration and domain types
pub mod core;

/// Static peer list parsed from configuration
pub mod discovery;

/// Request orchestration and HTTP listeners
pub mod gateway;

/// Logging, tracing and the dual-backend latency metrics
pub mod observability;

/// Outbound calls to peers
pub mod upstream;

/// CPU workload and per-request complexity lookup
pub mod workload;

pub use crate::core::config::NodeConfig;
pub use crate::core::error::{NodeError, NodeResult};
pub use crate::core::types::{CallOutcome, LatencyMeasurement, Peer, Phase, Status};
pub use crate::discovery::PeerRegistry;
pub use crate::gateway::{NodeContext, NodeServer, RequestOrchestrator};
pub use crate::upstream::{HttpPeerCaller, PeerCaller};
pub use crate::workload::{ComplexityResolver, WorkloadSimulator};
