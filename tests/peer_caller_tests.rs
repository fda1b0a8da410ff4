//! # Peer Caller Tests
//!
//! Exercises the HTTP peer caller against a mock peer: request shape,
//! status classification, deadlines and cancellation.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use telemetry_node::core::types::{CallOutcome, Peer};
use telemetry_node::upstream::{HttpPeerCaller, PeerCaller};

fn peer_for(server: &MockServer) -> Peer {
    let addr = server.address();
    Peer::new(addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn test_calls_internal_endpoint_with_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/internal"))
        .and(query_param("config", "A:10,B:20"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let caller = HttpPeerCaller::new(Duration::from_secs(5), false).unwrap();
    let outcome = caller
        .call(&CancellationToken::new(), &peer_for(&server), "A:10,B:20")
        .await;

    assert_eq!(outcome, CallOutcome::Success);
}

#[tokio::test]
async fn test_empty_config_is_still_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/internal"))
        .and(query_param("config", ""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let caller = HttpPeerCaller::new(Duration::from_secs(5), false).unwrap();
    let outcome = caller.call(&CancellationToken::new(), &peer_for(&server), "").await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_error_status_is_success_by_default() {
    let server = MockServer::start().await;
    Mock::given(path("/api/internal"))
        .respond_with(ResponseTemplate::new(500).set_body_string("ERROR"))
        .mount(&server)
        .await;

    let caller = HttpPeerCaller::new(Duration::from_secs(5), false).unwrap();
    let outcome = caller.call(&CancellationToken::new(), &peer_for(&server), "").await;

    assert_eq!(outcome, CallOutcome::Success);
}

#[tokio::test]
async fn test_error_status_fails_when_strict() {
    let server = MockServer::start().await;
    Mock::given(path("/api/internal"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let caller = HttpPeerCaller::new(Duration::from_secs(5), true).unwrap();
    let outcome = caller.call(&CancellationToken::new(), &peer_for(&server), "").await;

    match outcome {
        CallOutcome::Failure(reason) => assert!(reason.contains("503")),
        CallOutcome::Success => panic!("non-2xx must fail in strict mode"),
    }
}

#[tokio::test]
async fn test_slow_peer_times_out() {
    let server = MockServer::start().await;
    Mock::given(path("/api/internal"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(100);
    let caller = HttpPeerCaller::new(timeout, false).unwrap();
    let started = std::time::Instant::now();
    let outcome = caller.call(&CancellationToken::new(), &peer_for(&server), "").await;
    let elapsed = started.elapsed();

    assert!(!outcome.is_success());
    assert!(
        elapsed < timeout + Duration::from_millis(500),
        "call took {:?} with a {:?} deadline",
        elapsed,
        timeout
    );
}

#[tokio::test]
async fn test_cancel_mid_call_fails_promptly() {
    let server = MockServer::start().await;
    Mock::given(path("/api/internal"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let caller = HttpPeerCaller::new(Duration::from_secs(10), false).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = caller.call(&cancel, &peer_for(&server), "").await;

    assert_eq!(outcome, CallOutcome::Failure("request cancelled".to_string()));
    assert!(started.elapsed() < Duration::from_secs(5));
}
