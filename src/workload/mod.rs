//! # Workload Module
//!
//! Controllable CPU-bound work used to produce predictable latency, and the
//! per-request complexity lookup that parameterizes it.

pub mod complexity;
pub mod simulator;

pub use complexity::ComplexityResolver;
pub use simulator::WorkloadSimulator;

/// Intensity applied when a request's complexity config has no entry for this
/// node. Shared by `/api/action` and `/api/internal`.
pub const DEFAULT_INTENSITY: u64 = 100;
