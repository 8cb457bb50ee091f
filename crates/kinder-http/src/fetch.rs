//! Retried HTTP requests
//!
//! One request, retried under a policy, with a single timeout bounding the
//! whole sequence. The timeout does not reset between attempts: when it fires
//! the retry future is dropped, which aborts an in-flight request and any
//! pending backoff sleep alike, and releases the timer.

use kinder_core::retry::{
    JitterSource, RetryExecutor, RetryExecutorBuilder, RetryObserver, RetryPredicate,
    StatusClassifier, TracingObserver,
};
use kinder_core::types::{NetworkConfig, RetryPolicy, RetryPolicyOverrides, RuntimeConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Timeout applied when the caller does not pass one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Method, headers and body of a request
///
/// The request is rebuilt from these options for every attempt.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set the content type
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

/// Issue a request with retries and a whole-sequence timeout
///
/// `overrides` are merged over the default policy (3 attempts, 300ms initial
/// delay, 5s ceiling, factor 2, status codes 408/429/500/502/503/504).
/// Non-2xx responses become `FetchError::Status`; once retries are exhausted
/// the last error is returned as is. Expiry of `timeout` yields
/// `FetchError::Timeout`.
///
/// # Example
///
/// ```rust,no_run
/// use kinder_core::types::RetryPolicyOverrides;
/// use kinder_http::{fetch_with_retry, RequestOptions, DEFAULT_TIMEOUT};
///
/// async fn example() -> Result<(), kinder_http::FetchError> {
///     let client = reqwest::Client::new();
///     let response = fetch_with_retry(
///         &client,
///         "https://example.com/api/events",
///         &RequestOptions::new(),
///         DEFAULT_TIMEOUT,
///         &RetryPolicyOverrides::new().max_attempts(5),
///     )
///     .await?;
///     println!("{}", response.status());
///     Ok(())
/// }
/// ```
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    options: &RequestOptions,
    timeout: Duration,
    overrides: &RetryPolicyOverrides,
) -> Result<Response, FetchError> {
    let policy = RetryPolicy::default().with_overrides(overrides);
    let executor = http_executor(policy, url, options);
    fetch_with_executor(client, url, options, timeout, &executor).await
}

fn http_executor(
    policy: RetryPolicy,
    url: &str,
    options: &RequestOptions,
) -> RetryExecutor<StatusClassifier, TracingObserver> {
    RetryExecutorBuilder::new()
        .with_predicate(StatusClassifier::from_policy(&policy))
        .with_observer(TracingObserver::new(format!("{} {}", options.method, url)))
        .with_policy(policy)
        .build()
}

/// Issue a request through a caller-configured executor
///
/// Use this to inject an `on_retry` callback, a custom predicate or a
/// deterministic jitter source into HTTP calls.
pub async fn fetch_with_executor<P, O, J>(
    client: &Client,
    url: &str,
    options: &RequestOptions,
    timeout: Duration,
    executor: &RetryExecutor<P, O, J>,
) -> Result<Response, FetchError>
where
    P: RetryPredicate<FetchError>,
    O: RetryObserver<FetchError>,
    J: JitterSource,
{
    let attempts = AtomicU32::new(0);

    let sequence = executor.execute(|| {
        attempts.fetch_add(1, Ordering::SeqCst);
        send_once(client, url, options)
    });

    match tokio::time::timeout(timeout, sequence).await {
        Ok(result) => result,
        Err(_) => {
            let attempts = attempts.load(Ordering::SeqCst);
            warn!(
                url = %url,
                timeout_ms = timeout.as_millis() as u64,
                attempts = attempts,
                "request timed out, cancelling"
            );
            Err(FetchError::Timeout { timeout, attempts })
        }
    }
}

/// A single attempt: send, and turn a non-2xx status into an error
async fn send_once(
    client: &Client,
    url: &str,
    options: &RequestOptions,
) -> Result<Response, FetchError> {
    let mut request = client
        .request(options.method.clone(), url)
        .headers(options.headers.clone());
    if let Some(body) = &options.body {
        request = request.body(body.clone());
    }

    let response = request.send().await?;
    let status = response.status();

    debug!(method = %options.method, url = %url, status = status.as_u16(), "response received");

    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            status,
            response: Box::new(response),
        })
    }
}

/// HTTP client bundling a `reqwest::Client`, a timeout and a retry policy
///
/// # Example
///
/// ```rust,no_run
/// use kinder_core::ConfigLoader;
/// use kinder_http::HttpRetryClient;
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ConfigLoader::new()?.load_runtime_config()?;
///     let client = HttpRetryClient::from_config(&config, "dashboard")?;
///     let response = client.get("https://example.com/api/children").await?;
///     println!("{}", response.status());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpRetryClient {
    client: Client,
    timeout: Duration,
    policy: RetryPolicy,
}

impl HttpRetryClient {
    /// Create a client with built-in network defaults and the default policy
    pub fn new() -> Result<Self, FetchError> {
        Self::with_network(&NetworkConfig::default(), RetryPolicy::default())
    }

    /// Create a client from runtime configuration, using the policy for `operation`
    pub fn from_config(config: &RuntimeConfig, operation: &str) -> Result<Self, FetchError> {
        Self::with_network(
            &config.network,
            config.retry_policies.policy_for(operation).clone(),
        )
    }

    fn with_network(network: &NetworkConfig, policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(&network.user_agent).build()?;

        Ok(Self {
            client,
            timeout: network.request_timeout(),
            policy,
        })
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the whole-sequence timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue a request under the client's policy and timeout
    pub async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Response, FetchError> {
        self.fetch_with_overrides(url, options, &RetryPolicyOverrides::default())
            .await
    }

    /// Issue a request with per-call overrides merged over the client's policy
    pub async fn fetch_with_overrides(
        &self,
        url: &str,
        options: &RequestOptions,
        overrides: &RetryPolicyOverrides,
    ) -> Result<Response, FetchError> {
        let executor = http_executor(self.policy.with_overrides(overrides), url, options);
        fetch_with_executor(&self.client, url, options, self.timeout, &executor).await
    }

    /// Issue a GET request
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        self.fetch(url, &RequestOptions::new()).await
    }
}
