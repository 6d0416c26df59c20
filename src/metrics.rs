//! Prometheus metrics for the HTTP API.
//!
//! Exposes:
//! - `kg_assistant_http_request_duration_seconds` (histogram)
//! - `kg_assistant_http_requests_total` (counter with status)
//! - `kg_assistant_http_requests_inflight` (gauge)
//! - process metrics via `process` collector

use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tracing::{error, warn};

/// Route label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 5ms up to ~80s; LLM calls dominate the tail.
    let buckets =
        prometheus::exponential_buckets(0.005, 2.0, 15).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "kg_assistant_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["route"],
        buckets
    )
    .expect("failed to register request duration histogram")
});

static REQUEST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kg_assistant_http_requests_total",
        "Total HTTP requests by route and status",
        &["route", "status"]
    )
    .expect("failed to register request counter")
});

static REQUEST_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "kg_assistant_http_requests_inflight",
        "Number of in-flight HTTP requests",
        &["route"]
    )
    .expect("failed to register inflight gauge")
});

/// Ensure collectors are registered.
pub fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&REQUEST_DURATION);
    Lazy::force(&REQUEST_TOTAL);
    Lazy::force(&REQUEST_INFLIGHT);
}

/// Increment inflight gauge for a route.
pub fn record_request_start(route: &str) {
    init_collectors();
    REQUEST_INFLIGHT.with_label_values(&[route]).inc();
}

/// Record request completion with duration and status code.
pub fn record_request_result(route: &str, duration: Duration, status: StatusCode) {
    init_collectors();
    REQUEST_INFLIGHT.with_label_values(&[route]).dec();
    REQUEST_DURATION
        .with_label_values(&[route])
        .observe(duration.as_secs_f64());
    REQUEST_TOTAL
        .with_label_values(&[route, status.as_str()])
        .inc();
}

/// Middleware recording metrics per matched route.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    record_request_start(&route);
    let start = Instant::now();

    let response = next.run(req).await;

    record_request_result(&route, start.elapsed(), response.status());
    response
}

/// `GET /metrics` in the Prometheus text format.
pub async fn metrics_handler() -> Response {
    init_collectors();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return (StatusCode::INTERNAL_SERVER_ERROR, "encode error").into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn metrics_text() -> String {
        let response = metrics_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect metrics body")
            .to_bytes();
        String::from_utf8(body_bytes.to_vec()).expect("utf-8 metrics body")
    }

    #[test]
    fn records_successful_request_metrics() {
        let route = "/test/metrics/success";

        record_request_start(route);
        assert_eq!(REQUEST_INFLIGHT.with_label_values(&[route]).get(), 1);

        record_request_result(route, Duration::from_millis(120), StatusCode::OK);

        assert_eq!(REQUEST_INFLIGHT.with_label_values(&[route]).get(), 0);
        assert_eq!(REQUEST_TOTAL.with_label_values(&[route, "200"]).get(), 1);
        assert_eq!(
            REQUEST_DURATION
                .with_label_values(&[route])
                .get_sample_count(),
            1
        );
    }

    #[test]
    fn records_failed_request_metrics() {
        let route = "/test/metrics/error";

        record_request_start(route);
        record_request_result(route, Duration::from_secs(2), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(REQUEST_TOTAL.with_label_values(&[route, "500"]).get(), 1);
        let sum = REQUEST_DURATION.with_label_values(&[route]).get_sample_sum();
        assert!(sum >= 2.0);
    }

    #[test]
    fn routes_tracked_separately() {
        let a = "/test/metrics/a";
        let b = "/test/metrics/b";

        record_request_start(a);
        record_request_start(b);
        record_request_result(a, Duration::from_millis(5), StatusCode::OK);

        assert_eq!(REQUEST_INFLIGHT.with_label_values(&[a]).get(), 0);
        assert_eq!(REQUEST_INFLIGHT.with_label_values(&[b]).get(), 1);

        record_request_result(b, Duration::from_millis(5), StatusCode::NOT_FOUND);
        assert_eq!(REQUEST_INFLIGHT.with_label_values(&[b]).get(), 0);
    }

    #[test]
    fn init_collectors_can_be_called_multiple_times() {
        init_collectors();
        init_collectors();
    }

    #[tokio::test]
    async fn metrics_handler_renders_registered_metrics() {
        let route = "/test/metrics/render";
        record_request_start(route);
        record_request_result(route, Duration::from_millis(10), StatusCode::OK);

        let text = metrics_text().await;
        assert!(text.contains("kg_assistant_http_requests_total"));
        assert!(text.contains("kg_assistant_http_request_duration_seconds"));
        assert!(text.contains(route));
    }

    #[tokio::test]
    async fn metrics_handler_has_text_content_type() {
        let response = metrics_handler().await;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("text/plain"));
    }
}
