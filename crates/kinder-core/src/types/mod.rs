//! Configuration data types

mod retry_policy;
mod runtime_config;

pub use retry_policy::{RetryPolicy, RetryPolicyOverrides, DEFAULT_RETRYABLE_STATUS_CODES};
pub use runtime_config::{NetworkConfig, RetryPoliciesConfig, RuntimeConfig};
