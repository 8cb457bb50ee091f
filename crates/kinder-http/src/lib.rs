//! # kinder-http
//!
//! HTTP wrapper around the kinder-core retry executor:
//! - Non-2xx responses become `FetchError::Status`, carrying the status and
//!   the raw response, so the status classifier can see them
//! - A single timeout bounds the entire retry sequence and cancels it,
//!   including any backoff delay in progress
//! - `HttpRetryClient` wires the runtime configuration into a reusable client

pub mod error;
pub mod fetch;

pub use error::FetchError;
pub use fetch::{
    fetch_with_executor, fetch_with_retry, HttpRetryClient, RequestOptions, DEFAULT_TIMEOUT,
};
