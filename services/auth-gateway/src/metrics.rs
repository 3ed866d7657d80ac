//! Prometheus metrics exposition
//!
//! - `http_requests_total` (counter): labels `route`, `status`
//! - `http_request_duration_seconds` (histogram): label `route`
//! - `oauth_exchanges_total` (counter): labels `mode`, `outcome`
//! - `token_decrypt_failures_total` (counter): label `kind`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("http_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Buckets run from 5ms to 30s, past the token endpoint timeout.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request against its route template.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    let route = route.to_string();
    metrics::counter!(
        "http_requests_total",
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "route" => route).record(duration_secs);
}

/// Record a code exchange or refresh with the provider.
pub fn record_exchange(mode: &'static str, result: Result<(), &google_oauth::Error>) {
    let outcome = match result {
        Ok(()) => "success",
        Err(google_oauth::Error::ExchangeFailed { .. }) => "rejected",
        Err(google_oauth::Error::Network { .. }) => "network",
        Err(google_oauth::Error::InvalidResponse(_)) => "invalid",
        Err(google_oauth::Error::Config(_)) => "config",
    };
    metrics::counter!("oauth_exchanges_total", "mode" => mode, "outcome" => outcome).increment(1);
}

/// Record a stored token that failed to decrypt.
pub fn record_decrypt_failure(kind: &'static str) {
    metrics::counter!("token_decrypt_failures_total", "kind" => kind).increment(1);
}

#[cfg(test)]
pub(crate) fn isolated_recorder() -> (
    metrics_exporter_prometheus::PrometheusRecorder,
    PrometheusHandle,
) {
    let recorder = builder().unwrap().build_recorder();
    let handle = recorder.handle();
    (recorder, handle)
}
