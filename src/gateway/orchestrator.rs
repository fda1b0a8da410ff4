//! # Request Orchestrator
//!
//! Drives one `/api/action` request through
//! `Start → PeerFanOut → InternalWork → Respond → RecordTotal → Done`.
//! The response is built in `Respond`; hyper writes it once the handler
//! returns, after `RecordTotal`.
//!
//! - Peers are called sequentially. A failed peer never stops the remaining
//!   calls, and never skips internal work.
//! - Internal work runs on the blocking pool inside an `internal-processing`
//!   span. The span is dropped when the closure exits on every path,
//!   unwinding included.
//! - Two measurements are recorded per request: `internal-only` and `total`.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::config::NodeConfig;
use crate::core::types::{CallOutcome, LatencyMeasurement, Phase, Status};
use crate::discovery::PeerRegistry;
use crate::observability::metrics::MetricsSink;
use crate::upstream::PeerCaller;
use crate::workload::{ComplexityResolver, WorkloadSimulator};

/// `peer.service` attribute on the internal processing span
pub const PEER_SERVICE: &str = "ExampleService";

/// Process-wide state shared by every request, built once at startup
pub struct NodeContext {
    pub identity: String,
    pub instance_id: String,
    pub registry: PeerRegistry,
    pub resolver: ComplexityResolver,
    pub simulator: WorkloadSimulator,
    pub caller: Arc<dyn PeerCaller>,
    pub sink: Arc<dyn MetricsSink>,
}

impl NodeContext {
    pub fn new(
        config: &NodeConfig,
        instance_id: String,
        registry: PeerRegistry,
        caller: Arc<dyn PeerCaller>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            identity: config.identity.clone(),
            instance_id,
            registry,
            resolver: ComplexityResolver::new(config.identity.clone(), config.workload.default_intensity),
            simulator: WorkloadSimulator::new(),
            caller,
            sink,
        }
    }

    /// Replace the workload calibration
    pub fn with_simulator(mut self, simulator: WorkloadSimulator) -> Self {
        self.simulator = simulator;
        self
    }
}

/// Result of the fan-out and internal work for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Peers attempted, in registry order
    pub attempted: usize,
    /// Peers whose call resolved to `Failure`
    pub failed: usize,
    /// Internal work status
    pub internal: Status,
}

impl ActionOutcome {
    /// Logical AND over every peer outcome and the internal work.
    /// Vacuously true when there are no peers.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.internal == Status::Ok
    }

    pub fn status(&self) -> Status {
        Status::from_success(self.all_succeeded())
    }
}

impl IntoResponse for ActionOutcome {
    fn into_response(self) -> Response {
        status_response(self.status())
    }
}

/// `200 "OK"` or `500 "ERROR"`
pub fn status_response(status: Status) -> Response {
    match status {
        Status::Ok => (StatusCode::OK, "OK").into_response(),
        Status::Error => (StatusCode::INTERNAL_SERVER_ERROR, "ERROR").into_response(),
    }
}

/// The request handler behind `/api/action` and `/api/internal`
#[derive(Clone)]
pub struct RequestOrchestrator {
    ctx: Arc<NodeContext>,
}

impl RequestOrchestrator {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    /// Full `/api/action` flow
    pub async fn handle_action(&self, config: &str, cancel: &CancellationToken) -> ActionOutcome {
        self.serve_action(config, cancel).await.0
    }

    /// Full `/api/action` flow, also returning the HTTP response. The
    /// response is built before the `total` measurement is recorded.
    pub async fn serve_action(&self, config: &str, cancel: &CancellationToken) -> (ActionOutcome, Response) {
        let start = Instant::now();

        let mut attempted = 0;
        let mut failed = 0;
        for peer in self.ctx.registry.callable_from(&self.ctx.identity) {
            attempted += 1;
            if let CallOutcome::Failure(reason) = self.ctx.caller.call(cancel, peer, config).await {
                failed += 1;
                debug!(peer = %peer, %reason, "Peer counted as failed");
            }
        }

        let internal = self.run_internal(config).await;

        let outcome = ActionOutcome {
            attempted,
            failed,
            internal,
        };

        let response = outcome.clone().into_response();

        self.record(Phase::Total, outcome.status(), start);

        info!(
            attempted,
            failed,
            internal = %internal,
            status = %outcome.status(),
            "Action handled"
        );
        (outcome, response)
    }

    /// `/api/internal` flow: internal work only, no fan-out
    pub async fn handle_internal(&self, config: &str) -> Status {
        self.run_internal(config).await
    }

    /// InternalWork state: resolve intensity, simulate, record `internal-only`
    async fn run_internal(&self, config: &str) -> Status {
        info!("Starting internal processing");

        let span = tracing::info_span!("internal-processing", peer.service = PEER_SERVICE, intensity = tracing::field::Empty);
        let ctx = Arc::clone(&self.ctx);
        let config = config.to_owned();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                let intensity = ctx.resolver.resolve(&config);
                span.record("intensity", intensity);
                ctx.simulator.run(intensity)
            })
        })
        .await;

        let status = match result {
            Ok(Ok(iterations)) => {
                debug!(iterations, "Internal processing finished");
                Status::Ok
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Internal processing rejected");
                Status::Error
            }
            Err(e) => {
                error!(error = %e, "Internal processing task failed");
                Status::Error
            }
        };

        self.record(Phase::InternalOnly, status, start);
        status
    }

    fn record(&self, phase: Phase, status: Status, start: Instant) {
        self.ctx.sink.record(&LatencyMeasurement::new(
            phase,
            status,
            start.elapsed(),
            self.ctx.instance_id.as_str(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Peer;
    use crate::observability::metrics::RecordingSink;
    use async_trait::async_trait;

    struct AlwaysSucceeds;

    #[async_trait]
    impl PeerCaller for AlwaysSucceeds {
        async fn call(&self, _cancel: &CancellationToken, _peer: &Peer, _config: &str) -> CallOutcome {
            CallOutcome::Success
        }
    }

    fn context(identity: &str, peers: &str, sink: Arc<RecordingSink>) -> Arc<NodeContext> {
        let config = NodeConfig {
            identity: identity.to_string(),
            ..Default::default()
        };
        Arc::new(
            NodeContext::new(
                &config,
                "instance-1".to_string(),
                PeerRegistry::build(Some(peers)).unwrap(),
                Arc::new(AlwaysSucceeds),
                sink,
            )
            .with_simulator(WorkloadSimulator::with_work_units(1_000)),
        )
    }

    #[tokio::test]
    async fn test_self_entries_are_not_called() {
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = RequestOrchestrator::new(context("A", "A:8080,B:8080", sink));

        let outcome = orchestrator.handle_action("", &CancellationToken::new()).await;
        assert_eq!(outcome.attempted, 1);
        assert!(outcome.all_succeeded());
    }

    #[tokio::test]
    async fn test_zero_intensity_reports_internal_error() {
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = RequestOrchestrator::new(context("A", "", sink.clone()));

        let outcome = orchestrator.handle_action("A:0", &CancellationToken::new()).await;
        assert_eq!(outcome.internal, Status::Error);
        assert!(!outcome.all_succeeded());
        assert_eq!(sink.count(Phase::InternalOnly, Status::Error), 1);
        assert_eq!(sink.count(Phase::Total, Status::Error), 1);
    }

    #[tokio::test]
    async fn test_measurements_carry_instance_id() {
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = RequestOrchestrator::new(context("A", "", sink.clone()));

        orchestrator.handle_internal("").await;
        let measurements = sink.measurements();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].instance_id, "instance-1");
        assert_eq!(measurements[0].phase, Phase::InternalOnly);
    }

    #[tokio::test]
    async fn test_response_matches_recorded_total() {
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = RequestOrchestrator::new(context("A", "", sink.clone()));

        let (outcome, response) = orchestrator.serve_action("A:0", &CancellationToken::new()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sink.pairs().last(), Some(&(Phase::Total, outcome.status())));

        let (_, response) = orchestrator.serve_action("", &CancellationToken::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sink.pairs().last(), Some(&(Phase::Total, Status::Ok)));
    }

    #[test]
    fn test_outcome_response_status() {
        let ok = ActionOutcome { attempted: 0, failed: 0, internal: Status::Ok };
        assert_eq!(ok.into_response().status(), StatusCode::OK);

        let failed = ActionOutcome { attempted: 2, failed: 1, internal: Status::Ok };
        assert_eq!(failed.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
