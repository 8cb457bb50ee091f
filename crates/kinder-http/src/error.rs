//! Error type for retried HTTP requests

use kinder_core::retry::ErrorSignals;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Failure of a retried HTTP request
#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered with a non-2xx status
    ///
    /// The raw response is kept so callers can still read the body.
    #[error("request failed with status {status}")]
    Status {
        status: StatusCode,
        response: Box<Response>,
    },

    /// The request never produced a response (connect, send or body failure)
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The whole retry sequence outlived its timeout and was cancelled
    #[error("request cancelled after {}ms ({attempts} attempts started)", timeout.as_millis())]
    Timeout { timeout: Duration, attempts: u32 },
}

impl FetchError {
    /// Status code of a `Status` failure
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport(err) => err.status(),
            FetchError::Timeout { .. } => None,
        }
    }

    /// Raw response of a `Status` failure
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchError::Status { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }

    /// Take the raw response of a `Status` failure
    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchError::Status { response, .. } => Some(*response),
            _ => None,
        }
    }

    /// Whether the sequence was cut short by its timeout
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

impl ErrorSignals for FetchError {
    fn status_code(&self) -> Option<u16> {
        self.status().map(|status| status.as_u16())
    }

    fn is_network_failure(&self) -> bool {
        match self {
            FetchError::Transport(err) => err.is_connect() || err.is_request() || err.is_body(),
            _ => false,
        }
    }

    // Status failures are classified by code only; "504 Gateway Timeout"
    // must not count as a timeout when 504 is not in the retryable set.
    fn is_timeout(&self) -> bool {
        match self {
            FetchError::Transport(err) => err.is_timeout(),
            FetchError::Timeout { .. } => true,
            FetchError::Status { .. } => false,
        }
    }
}
