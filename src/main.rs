//! # Telemetry Node
//!
//! Loads configuration from the environment, initializes tracing, logging
//! and both metrics backends, then serves until SIGTERM or SIGINT.
//! Any startup failure is fatal.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use telemetry_node::core::config::NodeConfig;
use telemetry_node::core::error::{NodeError, NodeResult};
use telemetry_node::discovery::PeerRegistry;
use telemetry_node::gateway::{NodeContext, NodeServer, RequestOrchestrator};
use telemetry_node::observability::{init_logging, MetricsPipeline, NodeTracer};
use telemetry_node::upstream::HttpPeerCaller;

#[tokio::main]
async fn main() -> NodeResult<()> {
    let config = NodeConfig::load().await?;
    let instance_id = Uuid::new_v4().to_string();

    let tracer = NodeTracer::init(&config.observability, &config.identity, &instance_id)?;
    init_logging(&config.observability.logging, Some(tracer.tracer()))?;

    info!(
        service = %config.identity,
        endpoint = ?config.observability.otlp_endpoint,
        sample_rate = %config.observability.tracing.sample_rate,
        exporting = tracer.is_exporting(),
        "Distributed tracing initialized"
    );
    info!(identity = %config.identity, instance_id = %instance_id, "Starting telemetry node");

    let registry = PeerRegistry::build(config.peers.services.as_deref())?;
    let metrics = MetricsPipeline::install(&config, &instance_id)?;
    let caller = HttpPeerCaller::from_config(&config.peers)?;

    let context = NodeContext::new(
        &config,
        instance_id,
        registry,
        Arc::new(caller),
        metrics.sink(),
    );
    let orchestrator = RequestOrchestrator::new(Arc::new(context));
    let server = NodeServer::new(&config.server, orchestrator, metrics.prometheus_handle())?;

    let shutdown = CancellationToken::new();
    let server_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let served = server.run(shutdown.clone()).await;
            // A server that stops on its own takes the node down with it
            shutdown.cancel();
            served
        }
    });

    let signal = tokio::select! {
        signal = shutdown_signal() => {
            info!("Shutdown signal received, draining in-flight requests");
            shutdown.cancel();
            signal
        }
        _ = shutdown.cancelled() => Ok(()),
    };

    let served = server_task
        .await
        .map_err(|e| NodeError::internal(format!("Server task failed: {}", e)))
        .and_then(|served| served);

    metrics.shutdown();
    tracer.shutdown();

    let result = signal.and(served);
    match &result {
        Ok(()) => info!("Telemetry node stopped"),
        Err(e) => error!(error = %e, "Telemetry node stopped with error"),
    }
    result
}

/// Resolves on SIGTERM or SIGINT
async fn shutdown_signal() -> NodeResult<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| NodeError::internal(format!("Failed to install SIGTERM handler: {}", e)))?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = signal::ctrl_c() => {
            result.map_err(|e| NodeError::internal(format!("Failed to listen for SIGINT: {}", e)))?;
            info!("Received SIGINT");
        }
    }
    Ok(())
}
