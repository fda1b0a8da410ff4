// Per-request state machine: peer fan-out, internal work, measurements
pub mod orchestrator;

// HTTP listeners and route handlers
pub mod server;

pub use orchestrator::{ActionOutcome, NodeContext, RequestOrchestrator};
pub use server::{app_router, metrics_router, AppState, NodeServer};
