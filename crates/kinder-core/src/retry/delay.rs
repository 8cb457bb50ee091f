//! Backoff delay calculation
//!
//! `delay = min(initial * factor^attempt_index, max)`, then multiplied by a
//! jitter factor drawn from `[0.8, 1.2)`. Jitter is applied after the clamp,
//! so unless the policy sets `clamp_jitter` the result may exceed the ceiling
//! by up to 20%. Delays have millisecond resolution.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::types::RetryPolicy;

/// Lower bound of the jitter multiplier (inclusive)
pub const JITTER_MIN: f64 = 0.8;
/// Upper bound of the jitter multiplier (exclusive)
pub const JITTER_MAX: f64 = 1.2;

/// Source of jitter multipliers
///
/// Injectable so tests can pin the multiplier or replay a seeded sequence.
pub trait JitterSource: Send + Sync {
    /// Next multiplier, normally within `[JITTER_MIN, JITTER_MAX)`
    fn factor(&self) -> f64;
}

/// Thread-local RNG jitter. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn factor(&self) -> f64 {
        rand::rng().random_range(JITTER_MIN..JITTER_MAX)
    }
}

/// Deterministic jitter from a seeded `StdRng`
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn factor(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(JITTER_MIN..JITTER_MAX)
    }
}

/// Always returns the same multiplier, unchecked
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn factor(&self) -> f64 {
        self.0
    }
}

/// Disables jitter (multiplier of exactly 1.0)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn factor(&self) -> f64 {
        1.0
    }
}

impl<T: JitterSource + ?Sized> JitterSource for Arc<T> {
    fn factor(&self) -> f64 {
        (**self).factor()
    }
}

impl<T: JitterSource + ?Sized> JitterSource for Box<T> {
    fn factor(&self) -> f64 {
        (**self).factor()
    }
}

/// Un-jittered delay before the retry following `attempt_index`
///
/// `attempt_index` is zero-based: 0 is the wait before the second attempt.
///
/// # Example
///
/// ```rust
/// use kinder_core::retry::base_delay;
/// use kinder_core::types::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     initial_delay_ms: 100,
///     max_delay_ms: 1000,
///     backoff_factor: 2.0,
///     ..Default::default()
/// };
///
/// assert_eq!(base_delay(&policy, 0), Duration::from_millis(100));
/// assert_eq!(base_delay(&policy, 2), Duration::from_millis(400));
/// assert_eq!(base_delay(&policy, 10), Duration::from_millis(1000));
/// ```
pub fn base_delay(policy: &RetryPolicy, attempt_index: u32) -> Duration {
    Duration::from_millis(base_delay_ms(policy, attempt_index))
}

fn base_delay_ms(policy: &RetryPolicy, attempt_index: u32) -> u64 {
    if policy.initial_delay_ms == 0 {
        return 0;
    }

    let raw = policy.initial_delay_ms as f64 * policy.backoff_factor.powf(attempt_index as f64);

    // Overflow to infinity or a NaN factor both mean "past the ceiling"
    if !raw.is_finite() {
        return policy.max_delay_ms;
    }

    let capped = raw.max(0.0).min(policy.max_delay_ms as f64);
    capped.round() as u64
}

/// Jittered delay before the retry following `attempt_index`
pub fn calculate_delay<J: JitterSource + ?Sized>(
    policy: &RetryPolicy,
    attempt_index: u32,
    jitter: &J,
) -> Duration {
    let base_ms = base_delay_ms(policy, attempt_index);
    if base_ms == 0 {
        return Duration::ZERO;
    }

    let factor = jitter.factor();
    let factor = if factor.is_finite() { factor.max(0.0) } else { 1.0 };

    let mut delay_ms = (base_ms as f64 * factor).round() as u64;
    if policy.clamp_jitter {
        delay_ms = delay_ms.min(policy.max_delay_ms);
    }

    Duration::from_millis(delay_ms)
}
