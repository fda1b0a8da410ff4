// Node configuration and environment overrides
pub mod config;

// Error types shared by every module
pub mod error;

// Domain types: peers, call outcomes, latency measurements
pub mod types;
