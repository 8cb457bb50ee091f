//! Error classification
//!
//! Decides whether a failed attempt is worth repeating. `RetryPredicate` is the
//! seam the executor consults; `StatusClassifier` is the transient-failure
//! classifier used for remote calls, built on the `ErrorSignals` an error
//! exposes.

use std::fmt;
use std::io;

use crate::types::{RetryPolicy, DEFAULT_RETRYABLE_STATUS_CODES};

/// Inspectable facts about an error value
///
/// Every method has a conservative default, so an error type only needs to
/// describe what it actually knows.
pub trait ErrorSignals: fmt::Display {
    /// HTTP-style status (or service error code) carried by the error
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Whether the error is a connection-level failure (refused, reset, dropped)
    fn is_network_failure(&self) -> bool {
        false
    }

    /// Whether the error reports a timeout
    fn is_timeout(&self) -> bool {
        message_mentions_timeout(&self.to_string())
    }
}

fn message_mentions_timeout(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("timeout") || message.contains("timed out")
}

impl ErrorSignals for io::Error {
    fn is_network_failure(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        )
    }

    fn is_timeout(&self) -> bool {
        self.kind() == io::ErrorKind::TimedOut || message_mentions_timeout(&self.to_string())
    }
}

impl<T: ErrorSignals + ?Sized> ErrorSignals for Box<T> {
    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }

    fn is_network_failure(&self) -> bool {
        (**self).is_network_failure()
    }

    fn is_timeout(&self) -> bool {
        (**self).is_timeout()
    }
}

/// Classify an error as transient
///
/// Network failures and timeouts are always retryable. Anything else is
/// retryable only when it carries a status code from `retryable_codes`.
pub fn is_retryable<E: ErrorSignals + ?Sized>(error: &E, retryable_codes: &[u16]) -> bool {
    if error.is_network_failure() || error.is_timeout() {
        return true;
    }

    error
        .status_code()
        .is_some_and(|code| retryable_codes.contains(&code))
}

/// A predicate that determines whether an error should be retried
///
/// # Example
///
/// ```rust
/// use kinder_core::retry::RetryPredicate;
/// use std::io::{Error, ErrorKind};
///
/// struct IoRetryPredicate;
///
/// impl RetryPredicate<Error> for IoRetryPredicate {
///     fn should_retry(&self, error: &Error) -> bool {
///         !matches!(error.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied)
///     }
/// }
/// ```
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &E) -> bool;
}

/// Retries every error. Used when no classifier is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// Never retries
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// A predicate that uses a closure to determine retryability
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    E: ?Sized,
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

/// Transient-failure classifier for remote calls
///
/// Applies `is_retryable` with a configurable set of status codes.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    retryable_codes: Vec<u16>,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::with_codes(DEFAULT_RETRYABLE_STATUS_CODES.to_vec())
    }
}

impl StatusClassifier {
    /// Create a classifier with custom retryable status codes
    pub fn with_codes(codes: Vec<u16>) -> Self {
        Self {
            retryable_codes: codes,
        }
    }

    /// Create a classifier from a policy's `retryable_status_codes`
    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self::with_codes(policy.retryable_status_codes.clone())
    }

    pub fn is_retryable_code(&self, code: u16) -> bool {
        self.retryable_codes.contains(&code)
    }

    pub fn retryable_codes(&self) -> &[u16] {
        &self.retryable_codes
    }
}

impl<E: ErrorSignals + ?Sized> RetryPredicate<E> for StatusClassifier {
    fn should_retry(&self, error: &E) -> bool {
        is_retryable(error, &self.retryable_codes)
    }
}
