//! Resilient operation executor
//!
//! Wraps an asynchronous operation with bounded retries, exponential backoff
//! with jitter, a pluggable error classifier and an observer invoked before
//! each retry.
//!
//! # Features
//!
//! - Exponential backoff clamped to a ceiling, jittered by `[0.8, 1.2)`
//! - Injectable jitter source (`SeededJitter`, `FixedJitter`) for deterministic tests
//! - `StatusClassifier` for network failures, timeouts and retryable status codes
//! - Observable retries via `RetryObserver`, or a plain `(error, attempt)` callback
//! - Errors are returned unchanged; nothing is wrapped
//!
//! # Example
//!
//! ```rust,no_run
//! use kinder_core::retry::retry_with_policy;
//! use kinder_core::types::RetryPolicy;
//!
//! async fn example() -> Result<String, std::io::Error> {
//!     let policy = RetryPolicy::default();
//!
//!     retry_with_policy(&policy, || async {
//!         Ok("success".to_string())
//!     }).await
//! }
//! ```

mod classifier;
mod delay;
mod executor;
mod observer;

pub use classifier::{
    is_retryable, AlwaysRetry, ClosurePredicate, ErrorSignals, NeverRetry, RetryPredicate,
    StatusClassifier,
};
pub use delay::{
    base_delay, calculate_delay, FixedJitter, JitterSource, NoJitter, SeededJitter,
    ThreadRngJitter, JITTER_MAX, JITTER_MIN,
};
pub use executor::{retry, retry_with_policy, RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, OnRetry, RetryObserver, StatsObserver, TracingObserver};

#[cfg(test)]
mod tests;
