//! Retry observation and logging
//!
//! Observers receive the executor's lifecycle events. `on_retry` is the
//! injectable "before each retry" hook; `TracingObserver` is what runs when
//! the caller supplies nothing else.

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Observer trait for retry events
///
/// Only `on_retry` is required. It is called synchronously after a failure has
/// been classified as retryable and before the backoff delay starts.
///
/// # Example
///
/// ```rust
/// use kinder_core::retry::RetryObserver;
/// use std::time::Duration;
///
/// struct PrintObserver;
///
/// impl RetryObserver<std::io::Error> for PrintObserver {
///     fn on_retry(&self, error: &std::io::Error, attempt: u32, delay: Duration) {
///         eprintln!("attempt {} failed ({}), waiting {:?}", attempt, error, delay);
///     }
/// }
/// ```
pub trait RetryObserver<E: ?Sized>: Send + Sync {
    /// Called when an attempt is about to start (1-indexed)
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called when `attempt` failed and another attempt will follow after `delay`
    fn on_retry(&self, error: &E, attempt: u32, delay: Duration);

    /// Called when the operation succeeds
    fn on_success(&self, attempt: u32, total_duration: Duration) {
        let _ = (attempt, total_duration);
    }

    /// Called when the final permitted attempt failed with a retryable error
    fn on_exhausted(&self, attempts: u32, final_error: &E) {
        let _ = (attempts, final_error);
    }

    /// Called when the predicate rejected an error as not retryable
    fn on_rejected(&self, attempt: u32, error: &E) {
        let _ = (attempt, error);
    }
}

/// An observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl<E: ?Sized> RetryObserver<E> for NoOpObserver {
    fn on_retry(&self, _error: &E, _attempt: u32, _delay: Duration) {}
}

/// Logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_retry`: WARN
/// - `on_success`: INFO after retries, DEBUG on first attempt
/// - `on_exhausted`: ERROR
/// - `on_rejected`: WARN
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl<E: Display + ?Sized> RetryObserver<E> for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            max_attempts = max_attempts,
            "starting attempt"
        );
    }

    fn on_retry(&self, error: &E, attempt: u32, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &E) {
        tracing::error!(
            operation = %self.operation,
            attempts = attempts,
            error = %final_error,
            "all retry attempts exhausted"
        );
    }

    fn on_rejected(&self, attempt: u32, error: &E) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "giving up on non-retryable error"
        );
    }
}

/// Adapts an `(error, attempt)` closure into an observer
///
/// Only the retry event is forwarded.
pub struct OnRetry<F> {
    callback: F,
}

impl<F> OnRetry<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<E, F> RetryObserver<E> for OnRetry<F>
where
    E: ?Sized,
    F: Fn(&E, u32) + Send + Sync,
{
    fn on_retry(&self, error: &E, attempt: u32, _delay: Duration) {
        (self.callback)(error, attempt)
    }
}

/// Collects statistics about retry events
///
/// Useful for tests, and for telling exhaustion apart from an immediate
/// rejection after the fact.
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    retries: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    rejections: AtomicU32,
    delays: Mutex<Vec<Duration>>,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    pub fn rejections(&self) -> u32 {
        self.rejections.load(Ordering::SeqCst)
    }

    /// Backoff delays announced so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl<E: ?Sized> RetryObserver<E> for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(&self, _error: &E, _attempt: u32, delay: Duration) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(delay);
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _final_error: &E) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_rejected(&self, _attempt: u32, _error: &E) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }
}

impl<E: ?Sized, T: RetryObserver<E> + ?Sized> RetryObserver<E> for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_retry(&self, error: &E, attempt: u32, delay: Duration) {
        (**self).on_retry(error, attempt, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: &E) {
        (**self).on_exhausted(attempts, final_error)
    }

    fn on_rejected(&self, attempt: u32, error: &E) {
        (**self).on_rejected(attempt, error)
    }
}

impl<E: ?Sized, T: RetryObserver<E> + ?Sized> RetryObserver<E> for Box<T> {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_retry(&self, error: &E, attempt: u32, delay: Duration) {
        (**self).on_retry(error, attempt, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: &E) {
        (**self).on_exhausted(attempts, final_error)
    }

    fn on_rejected(&self, attempt: u32, error: &E) {
        (**self).on_rejected(attempt, error)
    }
}
