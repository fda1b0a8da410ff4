//! # HTTP Server Module
//!
//! Two listeners: the application port serving `/api/action`,
//! `/api/internal` and `/api/health`, and the metrics port serving the
//! Prometheus text exposition at `/metrics`.
//!
//! Each `/api/action` request runs on its own task. The handler holds a
//! drop guard for the request's cancellation token, so a client disconnect
//! cancels outstanding peer calls while the task still finishes internal
//! work and records both measurements.

use std::net::SocketAddr;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router as AxumRouter,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, Instrument};

use crate::core::config::ServerConfig;
use crate::core::error::{NodeError, NodeResult};
use crate::gateway::orchestrator::{status_response, RequestOrchestrator};
use crate::observability::tracing::server_span;

/// Query string accepted by `/api/action` and `/api/internal`
#[derive(Debug, Default, Deserialize)]
pub struct ComplexityQuery {
    /// Raw complexity list, e.g. `A:10,B:20`
    #[serde(default)]
    pub config: Option<String>,
}

impl ComplexityQuery {
    fn raw(&self) -> &str {
        self.config.as_deref().unwrap_or("")
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: RequestOrchestrator,
}

/// Application routes. The health route is added after the trace layer so
/// it never opens a span.
pub fn app_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/api/action", get(action_handler))
        .route("/api/internal", get(internal_handler))
        .layer(TraceLayer::new_for_http())
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// Prometheus scrape endpoint
pub fn metrics_router(handle: PrometheusHandle) -> AxumRouter {
    AxumRouter::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

async fn action_handler(
    State(state): State<AppState>,
    Query(query): Query<ComplexityQuery>,
    headers: HeaderMap,
) -> Response {
    let span = server_span("/api/action", &headers);
    let config = query.raw().to_owned();

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(
        async move { orchestrator.serve_action(&config, &cancel).await }.instrument(span),
    );

    match task.await {
        Ok((_, response)) => response,
        Err(e) => {
            error!(error = %e, "Action task failed");
            NodeError::internal(format!("Action task failed: {}", e)).into_response()
        }
    }
}

async fn internal_handler(
    State(state): State<AppState>,
    Query(query): Query<ComplexityQuery>,
    headers: HeaderMap,
) -> Response {
    let span = server_span("/api/internal", &headers);
    debug!(config = %query.raw(), "Internal request received");

    let status = state
        .orchestrator
        .handle_internal(query.raw())
        .instrument(span)
        .await;

    status_response(status)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Both listeners of one node
pub struct NodeServer {
    app_addr: SocketAddr,
    metrics_addr: SocketAddr,
    app: AxumRouter,
    metrics_app: AxumRouter,
}

impl NodeServer {
    pub fn new(
        config: &ServerConfig,
        orchestrator: RequestOrchestrator,
        prometheus: PrometheusHandle,
    ) -> NodeResult<Self> {
        let app_addr = socket_addr(&config.bind_address, config.http_port)?;
        let metrics_addr = socket_addr(&config.bind_address, config.metrics_port)?;

        Ok(Self {
            app_addr,
            metrics_addr,
            app: app_router(AppState { orchestrator }),
            metrics_app: metrics_router(prometheus),
        })
    }

    pub fn app_addr(&self) -> SocketAddr {
        self.app_addr
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    /// Serve until `shutdown` fires. In-flight requests are drained before
    /// this returns.
    pub async fn run(self, shutdown: CancellationToken) -> NodeResult<()> {
        let app_listener = TcpListener::bind(self.app_addr)
            .await
            .map_err(|e| NodeError::internal(format!("Failed to bind application server to {}: {}", self.app_addr, e)))?;

        let metrics_listener = TcpListener::bind(self.metrics_addr)
            .await
            .map_err(|e| NodeError::internal(format!("Failed to bind metrics server to {}: {}", self.metrics_addr, e)))?;

        info!(addr = %self.app_addr, "Application server listening");
        info!(addr = %self.metrics_addr, "Metrics server listening");

        let app_shutdown = shutdown.clone();
        let app_server = axum::serve(app_listener, self.app)
            .with_graceful_shutdown(async move { app_shutdown.cancelled().await });

        let metrics_shutdown = shutdown.clone();
        let metrics_server = axum::serve(metrics_listener, self.metrics_app)
            .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await });

        let (app_result, metrics_result) = tokio::join!(app_server, metrics_server);
        app_result.map_err(|e| NodeError::internal(format!("Application server error: {}", e)))?;
        metrics_result.map_err(|e| NodeError::internal(format!("Metrics server error: {}", e)))?;

        info!("Servers stopped");
        Ok(())
    }
}

fn socket_addr(host: &str, port: u16) -> NodeResult<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| NodeError::config(format!("Invalid bind address {}:{}: {}", host, port, e)))
}
