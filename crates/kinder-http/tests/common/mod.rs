//! Shared helpers for HTTP retry tests
//!
//! Mock endpoints built on wiremock and policy overrides with short delays.

#![allow(dead_code)]

use kinder_core::types::RetryPolicyOverrides;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Route retry diagnostics to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Overrides with millisecond-scale delays so tests stay fast
pub fn fast_overrides(max_attempts: u32) -> RetryPolicyOverrides {
    RetryPolicyOverrides::new()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(5))
        .max_delay(Duration::from_millis(20))
}

/// Full URL for `route` on the mock server
pub fn url(server: &MockServer, route: &str) -> String {
    format!("{}{}", server.uri(), route)
}

/// Respond to GET `route` with `status` on every request
pub async fn mock_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(format!("status {}", status)))
        .mount(server)
        .await;
}

/// First `fail_count` GET requests get `fail_status`, later ones get 200 with `body`
pub async fn mock_flaky(server: &MockServer, route: &str, fail_status: u16, fail_count: u64, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(fail_status))
        .up_to_n_times(fail_count)
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .with_priority(2)
        .mount(server)
        .await;
}

/// Respond to GET `route` with `status` after `delay`
pub async fn mock_slow(server: &MockServer, route: &str, status: u16, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_delay(delay))
        .mount(server)
        .await;
}

/// Number of requests the server has seen
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
