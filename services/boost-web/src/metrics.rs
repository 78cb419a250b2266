//! Prometheus metrics exposition
//!
//! - `http_requests_total` (counter): labels `route`, `status`
//! - `http_request_duration_seconds` (histogram): label `route`
//! - `boost_runs_total`, `boost_aborts_total` (recorded by the boost crate)
//! - `device_api_errors_total` (recorded by the device client)

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "http_request_duration_seconds";

/// Page handlers call Google at least once, so buckets reach well past a second.
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .expect("histogram buckets are non-empty")
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Build a recorder without installing it; used by tests.
#[cfg(test)]
pub fn build_recorder() -> metrics_exporter_prometheus::PrometheusRecorder {
    builder().build_recorder()
}

/// Record a completed request.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!("http_requests_total", "route" => route.to_string(), "status" => status.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}

/// Middleware recording every request under its matched route pattern.
///
/// Unmatched paths share one `unmatched` label so scanners cannot blow up
/// label cardinality.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();
    let response = next.run(request).await;
    record_request(
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
