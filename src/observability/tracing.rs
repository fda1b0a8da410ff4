//! # Distributed Tracing
//!
//! OpenTelemetry tracer bootstrap and W3C trace-context propagation.
//!
//! `tracing` spans are bridged to OpenTelemetry through `tracing-opentelemetry`,
//! so handlers only deal with `tracing::Span`. The helpers here move the span
//! context in and out of HTTP headers.

use std::collections::HashMap;

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TextMapCompositePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{self as sdktrace, Sampler, Tracer, TracerProvider as SdkTracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tracing::{info, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::core::error::{NodeError, NodeResult};
use crate::observability::config::ObservabilityConfig;

/// Instrumentation scope name for spans created by this node
pub const TRACER_NAME: &str = "telemetry-node";

/// Handle on the installed tracer provider
pub struct NodeTracer {
    tracer: Tracer,
    exporting: bool,
}

impl NodeTracer {
    /// Install the global propagator and tracer provider.
    ///
    /// Spans are exported over OTLP when an endpoint is configured. Without
    /// one, spans are still created so context propagates to peers.
    pub fn init(config: &ObservabilityConfig, identity: &str, instance_id: &str) -> NodeResult<Self> {
        install_propagator();

        let trace_config = sdktrace::config()
            .with_sampler(sampler_for(config.tracing.sample_rate))
            .with_resource(node_resource(identity, instance_id));

        let (tracer, exporting) = match &config.otlp_endpoint {
            Some(endpoint) => {
                let tracer = opentelemetry_otlp::new_pipeline()
                    .tracing()
                    .with_exporter(
                        opentelemetry_otlp::new_exporter()
                            .tonic()
                            .with_endpoint(otlp_url(endpoint)),
                    )
                    .with_trace_config(trace_config)
                    .install_batch(runtime::Tokio)
                    .map_err(|e| NodeError::telemetry(format!("Failed to install OTLP tracer: {}", e)))?;
                (tracer, true)
            }
            None => {
                let provider = SdkTracerProvider::builder().with_config(trace_config).build();
                let tracer = provider.tracer(TRACER_NAME);
                global::set_tracer_provider(provider);
                (tracer, false)
            }
        };

        Ok(Self { tracer, exporting })
    }

    pub fn tracer(&self) -> Tracer {
        self.tracer.clone()
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Flush and shut down the global tracer provider
    pub fn shutdown(&self) {
        global::shutdown_tracer_provider();
        info!("Distributed tracer shutdown completed");
    }
}

/// Resource attributes shared by traces and OpenTelemetry metrics
pub fn node_resource(identity: &str, instance_id: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", identity.to_string()),
        KeyValue::new("service.instance.id", instance_id.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}

/// Sampler for a sample rate, honouring the caller's sampling decision
pub fn sampler_for(sample_rate: f64) -> Sampler {
    let root = if sample_rate >= 1.0 {
        Sampler::AlwaysOn
    } else if sample_rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(sample_rate)
    };
    Sampler::ParentBased(Box::new(root))
}

/// Prefix a bare `host:port` collector address with a scheme
pub fn otlp_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// W3C `traceparent` plus `baggage`
pub fn install_propagator() {
    let propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>> = vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ];
    global::set_text_map_propagator(TextMapCompositePropagator::new(propagators));
}

/// Read-only view of inbound request headers for the propagator
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

/// Parent context carried by inbound request headers
pub fn extract_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Propagation headers for `cx`
pub fn inject_context(cx: &Context) -> HashMap<String, String> {
    let mut carrier = HashMap::new();
    global::get_text_map_propagator(|propagator| propagator.inject_context(cx, &mut carrier));
    carrier
}

/// Propagation headers for the current `tracing` span
pub fn current_context_headers() -> HashMap<String, String> {
    inject_context(&Span::current().context())
}

/// Server span for an inbound request, parented on the caller's context
pub fn server_span(route: &'static str, headers: &HeaderMap) -> Span {
    let span = tracing::info_span!(
        "http.request",
        otel.name = route,
        otel.kind = "server",
        http.method = "GET",
        http.route = route,
    );
    span.set_parent(extract_context(headers));
    span
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    #[test]
    fn test_extract_traceparent() {
        install_propagator();

        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            format!("00-{}-{}-01", TRACE_ID, SPAN_ID).parse().unwrap(),
        );

        let cx = extract_context(&headers);
        let span = cx.span();
        let span_context = span.span_context();
        assert!(span_context.is_valid());
        assert!(span_context.is_remote());
        assert_eq!(span_context.trace_id(), TraceId::from_hex(TRACE_ID).unwrap());
        assert_eq!(span_context.span_id(), SpanId::from_hex(SPAN_ID).unwrap());
    }

    #[test]
    fn test_missing_headers_yield_invalid_context() {
        install_propagator();
        let cx = extract_context(&HeaderMap::new());
        assert!(!cx.span().span_context().is_valid());
    }

    #[test]
    fn test_inject_writes_traceparent() {
        install_propagator();

        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex(SPAN_ID).unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span_context);

        let headers = inject_context(&cx);
        assert_eq!(
            headers.get("traceparent").map(String::as_str),
            Some(format!("00-{}-{}-01", TRACE_ID, SPAN_ID).as_str())
        );
    }

    #[test]
    fn test_composite_propagator_carries_baggage() {
        use opentelemetry::baggage::BaggageExt;

        install_propagator();

        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex(SPAN_ID).unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new()
            .with_remote_span_context(span_context)
            .with_baggage(vec![KeyValue::new("tenant", "blue")]);

        let headers = inject_context(&cx);
        assert!(headers.contains_key("traceparent"));
        assert_eq!(headers.get("baggage").map(String::as_str), Some("tenant=blue"));

        let mut inbound = HeaderMap::new();
        for (name, value) in &headers {
            inbound.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        let extracted = extract_context(&inbound);
        assert_eq!(extracted.baggage().get("tenant").map(|v| v.as_str().to_string()), Some("blue".to_string()));
        assert_eq!(extracted.span().span_context().trace_id(), TraceId::from_hex(TRACE_ID).unwrap());
    }

    #[test]
    fn test_otlp_url() {
        assert_eq!(otlp_url("otel-agent:4317"), "http://otel-agent:4317");
        assert_eq!(otlp_url("https://collector:4317"), "https://collector:4317");
    }

    #[test]
    fn test_sampler_bounds() {
        assert!(matches!(sampler_for(1.0), Sampler::ParentBased(_)));
        assert!(matches!(sampler_for(0.0), Sampler::ParentBased(_)));
    }
}
