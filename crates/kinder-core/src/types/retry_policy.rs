//! Retry policy types
//!
//! A `RetryPolicy` is immutable configuration consumed by a single executor
//! invocation. `RetryPolicyOverrides` is the partial form merged over a base
//! policy, the same way file and environment layers are merged by the config
//! loader.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// HTTP status codes retried when no explicit list is configured
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry policy for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for the un-jittered delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Status codes considered transient by `StatusClassifier`
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,

    /// Clamp the jittered delay to `max_delay_ms` as well.
    ///
    /// Off by default: jitter is applied after clamping, so a delay may exceed
    /// the ceiling by up to 20%.
    #[serde(default)]
    pub clamp_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            retryable_status_codes: default_retryable_status_codes(),
            clamp_jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    300
}
fn default_max_delay() -> u64 {
    5000
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_retryable_status_codes() -> Vec<u16> {
    DEFAULT_RETRYABLE_STATUS_CODES.to_vec()
}

impl RetryPolicy {
    /// Delay before the first retry
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Ceiling for the un-jittered delay
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Number of attempts the executor will actually make (never less than one)
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Return a copy of this policy with every `Some` field of `overrides` applied
    pub fn with_overrides(&self, overrides: &RetryPolicyOverrides) -> Self {
        Self {
            max_attempts: overrides.max_attempts.unwrap_or(self.max_attempts),
            initial_delay_ms: overrides.initial_delay_ms.unwrap_or(self.initial_delay_ms),
            max_delay_ms: overrides.max_delay_ms.unwrap_or(self.max_delay_ms),
            backoff_factor: overrides.backoff_factor.unwrap_or(self.backoff_factor),
            retryable_status_codes: overrides
                .retryable_status_codes
                .clone()
                .unwrap_or_else(|| self.retryable_status_codes.clone()),
            clamp_jitter: overrides.clamp_jitter.unwrap_or(self.clamp_jitter),
        }
    }

    /// Check the policy invariants
    ///
    /// A ceiling below the initial delay is accepted with a warning: the
    /// ceiling still clamps, the initial delay is just never reached.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(Error::invalid_policy("max-attempts must be at least 1"));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            return Err(Error::invalid_policy(format!(
                "backoff-factor must be a finite number greater than 1, got {}",
                self.backoff_factor
            )));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            tracing::warn!(
                initial_delay_ms = self.initial_delay_ms,
                max_delay_ms = self.max_delay_ms,
                "max-delay-ms is below initial-delay-ms; every delay will be clamped"
            );
        }

        Ok(())
    }
}

/// Partial retry policy, merged over a base with `RetryPolicy::with_overrides`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable_status_codes: Option<Vec<u16>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clamp_jitter: Option<bool>,
}

impl RetryPolicyOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    pub fn retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable_status_codes = Some(codes);
        self
    }

    pub fn clamp_jitter(mut self, clamp: bool) -> Self {
        self.clamp_jitter = Some(clamp);
        self
    }
}
