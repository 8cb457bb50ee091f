//! # kinder-core
//!
//! Core library for Kinder providing:
//! - Retry policy types and their partial overrides
//! - Hierarchical runtime configuration (embedded defaults, file, environment)
//! - The resilient operation executor: error classification, backoff with
//!   jitter, and observable retries

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::ConfigLoader;
pub use error::{Error, Result};
pub use types::{RetryPolicy, RetryPolicyOverrides};
