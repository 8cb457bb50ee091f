//! Retry execution engine
//!
//! Attempts run strictly one after another: attempt N+1 starts only after
//! attempt N's error has been classified, observed and its delay has fully
//! elapsed. The executor keeps no state between calls, so one executor can
//! drive any number of concurrent `execute` futures.

use std::future::Future;
use tokio::time::Instant;

use crate::types::{RetryPolicy, RetryPolicyOverrides};

use super::classifier::{AlwaysRetry, RetryPredicate};
use super::delay::{calculate_delay, JitterSource, ThreadRngJitter};
use super::observer::{OnRetry, RetryObserver, TracingObserver};

/// Retry an operation with the default policy merged with `overrides`
///
/// Every error is considered retryable and retries are logged through
/// `TracingObserver`. The last error is returned unchanged.
///
/// # Example
///
/// ```rust,no_run
/// use kinder_core::retry::retry;
/// use kinder_core::types::RetryPolicyOverrides;
///
/// async fn example() -> Result<String, std::io::Error> {
///     retry(
///         || async { Ok("ok".to_string()) },
///         &RetryPolicyOverrides::new().max_attempts(5),
///     )
///     .await
/// }
/// ```
pub async fn retry<F, Fut, T, E>(op: F, overrides: &RetryPolicyOverrides) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    RetryExecutorBuilder::new()
        .with_overrides(overrides)
        .build()
        .execute(op)
        .await
}

/// Retry an operation under an explicit policy
pub async fn retry_with_policy<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .build()
        .execute(op)
        .await
}

/// Builder for configuring a `RetryExecutor`
///
/// # Example
///
/// ```rust
/// use kinder_core::retry::{RetryExecutorBuilder, SeededJitter, StatusClassifier};
/// use kinder_core::types::RetryPolicy;
///
/// let executor = RetryExecutorBuilder::new()
///     .with_policy(RetryPolicy::default())
///     .with_predicate(StatusClassifier::default())
///     .with_on_retry(|err: &std::io::Error, attempt: u32| eprintln!("#{attempt}: {err}"))
///     .with_jitter(SeededJitter::new(7))
///     .build();
/// ```
pub struct RetryExecutorBuilder<P = AlwaysRetry, O = TracingObserver, J = ThreadRngJitter> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: J,
}

impl Default for RetryExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder {
    /// Create a builder with the default policy, retrying every error
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            predicate: AlwaysRetry,
            observer: TracingObserver::default(),
            jitter: ThreadRngJitter,
        }
    }
}

impl<P, O, J> RetryExecutorBuilder<P, O, J> {
    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Merge partial overrides over the current policy
    pub fn with_overrides(mut self, overrides: &RetryPolicyOverrides) -> Self {
        self.policy = self.policy.with_overrides(overrides);
        self
    }

    /// Set the predicate deciding which errors are retried
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutorBuilder<P2, O, J> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate,
            observer: self.observer,
            jitter: self.jitter,
        }
    }

    /// Set the observer, replacing the default tracing diagnostics
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<P, O2, J> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            jitter: self.jitter,
        }
    }

    /// Set an `(error, attempt)` callback invoked before each retry delay
    pub fn with_on_retry<F>(self, callback: F) -> RetryExecutorBuilder<P, OnRetry<F>, J> {
        self.with_observer(OnRetry::new(callback))
    }

    /// Set the jitter source
    pub fn with_jitter<J2>(self, jitter: J2) -> RetryExecutorBuilder<P, O, J2> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            jitter,
        }
    }

    pub fn build(self) -> RetryExecutor<P, O, J> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            jitter: self.jitter,
        }
    }
}

/// A retry executor with configurable policy, predicate, observer and jitter
///
/// Use `RetryExecutorBuilder` to create an instance.
pub struct RetryExecutor<P = AlwaysRetry, O = TracingObserver, J = ThreadRngJitter> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: J,
}

impl<P, O, J> RetryExecutor<P, O, J> {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with retry logic
    ///
    /// Returns the first success, or the last error unchanged once the
    /// predicate rejects it or `max_attempts` attempts have been made.
    /// There is no overall deadline here; wrap the returned future in
    /// `tokio::time::timeout` to bound the whole sequence.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: RetryPredicate<E>,
        O: RetryObserver<E>,
        J: JitterSource,
    {
        let start = Instant::now();
        let max_attempts = self.policy.effective_max_attempts();
        let mut attempt = 1;

        loop {
            self.observer.on_attempt_start(attempt, max_attempts);

            let delay = match op().await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => {
                    if !self.predicate.should_retry(&err) {
                        self.observer.on_rejected(attempt, &err);
                        return Err(err);
                    }

                    if attempt >= max_attempts {
                        self.observer.on_exhausted(attempt, &err);
                        return Err(err);
                    }

                    let delay = calculate_delay(&self.policy, attempt - 1, &self.jitter);
                    self.observer.on_retry(&err, attempt, delay);
                    delay
                }
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            attempt += 1;
        }
    }
}
