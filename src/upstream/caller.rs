//! # Peer Caller
//!
//! One outbound `GET /api/internal` to one peer, under a deadline, with the
//! current trace context attached. Every call resolves to exactly one
//! [`CallOutcome`]; transport errors, timeouts and cancellation all become
//! `Failure` and nothing is retried.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::core::config::PeerListConfig;
use crate::core::error::{NodeError, NodeResult};
use crate::core::types::{CallOutcome, Peer};
use crate::observability::tracing::current_context_headers;

/// Performs one call to one peer
#[async_trait]
pub trait PeerCaller: Send + Sync {
    /// Call `peer`, forwarding the raw complexity `config`.
    ///
    /// Resolves to `Failure` as soon as `cancel` fires.
    async fn call(&self, cancel: &CancellationToken, peer: &Peer, config: &str) -> CallOutcome;
}

/// `reqwest`-backed peer caller
#[derive(Debug, Clone)]
pub struct HttpPeerCaller {
    client: HttpClient,
    timeout: Duration,
    strict_status: bool,
}

impl HttpPeerCaller {
    /// Create a caller with a per-call deadline. With `strict_status`, a
    /// non-2xx response counts as a failure.
    pub fn new(timeout: Duration, strict_status: bool) -> NodeResult<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            strict_status,
        })
    }

    pub fn from_config(config: &PeerListConfig) -> NodeResult<Self> {
        Self::new(config.call_timeout, config.strict_status)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send the request and read the whole body
    async fn exchange(&self, peer: &Peer, config: &str) -> NodeResult<(reqwest::StatusCode, String)> {
        let mut request = self
            .client
            .get(peer.internal_url())
            .query(&[("config", config)]);

        for (name, value) in current_context_headers() {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(peer = %peer.address, error = %e, "Failed to read peer response body");
                String::new()
            }
        };

        Ok((status, body))
    }

    fn classify(&self, peer: &Peer, status: reqwest::StatusCode, body: &str) -> CallOutcome {
        debug!(peer = %peer.address, status = status.as_u16(), body = %body, "Response received");

        if self.strict_status && !status.is_success() {
            let reason = format!("peer responded with status {}", status.as_u16());
            warn!(peer = %peer.address, %reason, "Peer call failed");
            return CallOutcome::Failure(reason);
        }

        CallOutcome::Success
    }
}

#[async_trait]
impl PeerCaller for HttpPeerCaller {
    async fn call(&self, cancel: &CancellationToken, peer: &Peer, config: &str) -> CallOutcome {
        let span = tracing::info_span!(
            "peer-call",
            otel.name = "GET /api/internal",
            otel.kind = "client",
            peer.address = %peer.address,
            peer.port = peer.port,
        );

        async {
            info!(peer = %peer.address, "Calling peer");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(peer = %peer.address, "Request cancelled, abandoning peer call");
                    CallOutcome::Failure("request cancelled".to_string())
                }
                result = timeout(self.timeout, self.exchange(peer, config)) => match result {
                    Ok(Ok((status, body))) => self.classify(peer, status, &body),
                    Ok(Err(e)) => {
                        warn!(peer = %peer.address, error = %e, "Peer call failed");
                        CallOutcome::Failure(e.to_string())
                    }
                    Err(_) => {
                        let err = NodeError::Timeout {
                            timeout_ms: self.timeout.as_millis() as u64,
                        };
                        warn!(peer = %peer.address, error = %err, "Peer call timed out");
                        CallOutcome::Failure(err.to_string())
                    }
                },
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_token_fails_immediately() {
        let caller = HttpPeerCaller::new(Duration::from_secs(10), false).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Port 9 (discard) is never contacted: cancellation is checked first.
        let outcome = caller.call(&cancel, &Peer::new("127.0.0.1", 9), "").await;
        assert_eq!(outcome, CallOutcome::Failure("request cancelled".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_failure() {
        let caller = HttpPeerCaller::new(Duration::from_secs(2), false).unwrap();
        let cancel = CancellationToken::new();

        let outcome = caller
            .call(&cancel, &Peer::new("invalid.host.localdomain.invalid", 8080), "")
            .await;
        assert!(!outcome.is_success());
    }
}
