//! Integration tests for the retry module
//!
//! These run on tokio's paused clock, so elapsed times are exact and the
//! backoff sleeps cost nothing.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::retry::{
    base_delay, calculate_delay, retry, ErrorSignals, FixedJitter, RetryExecutorBuilder,
    RetryObserver, SeededJitter, StatsObserver, StatusClassifier, JITTER_MAX, JITTER_MIN,
};
use crate::types::{RetryPolicy, RetryPolicyOverrides};

/// A service error carrying a status code, as returned by a remote API client
#[derive(Debug, Clone, PartialEq)]
struct ServiceError {
    status: u16,
    id: u32,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service responded with {} (#{})", self.status, self.id)
    }
}

impl ErrorSignals for ServiceError {
    fn status_code(&self) -> Option<u16> {
        Some(self.status)
    }
}

fn policy(max_attempts: u32, initial_delay_ms: u64, backoff_factor: f64, max_delay_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay_ms,
        max_delay_ms,
        backoff_factor,
        ..Default::default()
    }
}

/// Records `(attempt, elapsed)` for every retry notification
struct Timeline {
    start: Instant,
    events: Mutex<Vec<(u32, Duration)>>,
}

impl Timeline {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<(u32, Duration)> {
        self.events.lock().unwrap().clone()
    }
}

impl<E: ?Sized> RetryObserver<E> for Timeline {
    fn on_retry(&self, _error: &E, attempt: u32, _delay: Duration) {
        self.events
            .lock()
            .unwrap()
            .push((attempt, self.start.elapsed()));
    }
}

// ============================================================================
// Attempt bounds
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_always_failing_operation_runs_exactly_max_attempts() {
    for max_attempts in 1..=6 {
        let calls = AtomicU32::new(0);

        let result: Result<(), ServiceError> = RetryExecutorBuilder::new()
            .with_policy(policy(max_attempts, 5, 2.0, 100))
            .with_predicate(StatusClassifier::default())
            .build()
            .execute(|| async {
                let id = calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError { status: 503, id })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
    }
}

#[tokio::test(start_paused = true)]
async fn test_immediate_success_waits_for_nothing() {
    let retried = AtomicU32::new(0);
    let start = Instant::now();

    let result: Result<&str, ServiceError> = RetryExecutorBuilder::new()
        .with_policy(policy(5, 1000, 2.0, 10_000))
        .with_on_retry(|_: &ServiceError, _: u32| {
            retried.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .execute(|| async { Ok("ok") })
        .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(retried.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_short_circuits_without_delay() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result: Result<(), ServiceError> = RetryExecutorBuilder::new()
        .with_policy(policy(5, 1000, 2.0, 10_000))
        .with_predicate(StatusClassifier::default())
        .build()
        .execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError { status: 404, id: 0 })
        })
        .await;

    assert_eq!(result.unwrap_err().status, 404);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

// ============================================================================
// Delay sequence
// ============================================================================

#[test]
fn test_unjittered_delay_sequence() {
    let policy = policy(4, 100, 2.0, 1000);

    let delays: Vec<_> = (0..3).map(|i| base_delay(&policy, i)).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400)
        ]
    );
}

#[test]
fn test_seeded_jitter_stays_within_twenty_percent() {
    let policy = policy(4, 100, 2.0, 1000);
    let jitter = SeededJitter::new(0x5eed);

    for _ in 0..500 {
        for (index, expected_ms) in [(0u32, 100.0), (1, 200.0), (2, 400.0)] {
            let delay = calculate_delay(&policy, index, &jitter).as_millis() as f64;
            assert!(delay >= expected_ms * JITTER_MIN);
            assert!(delay <= expected_ms * JITTER_MAX);
        }
    }
}

#[test]
fn test_ceiling_applies_before_jitter() {
    let policy = policy(5, 100, 10.0, 500);
    let jitter = SeededJitter::new(99);

    for _ in 0..500 {
        let delay = calculate_delay(&policy, 3, &jitter);
        assert!(delay >= Duration::from_millis(400));
        assert!(delay <= Duration::from_millis(600));
    }
}

#[test]
fn test_ceiling_applies_after_jitter_when_clamped() {
    let mut policy = policy(5, 100, 10.0, 500);
    policy.clamp_jitter = true;
    let jitter = SeededJitter::new(99);

    for _ in 0..500 {
        let delay = calculate_delay(&policy, 3, &jitter);
        assert!(delay >= Duration::from_millis(400));
        assert!(delay <= Duration::from_millis(500));
    }
}

#[tokio::test(start_paused = true)]
async fn test_executor_sleeps_the_computed_delays() {
    let observer = Arc::new(StatsObserver::new());
    let start = Instant::now();

    let result: Result<(), ServiceError> = RetryExecutorBuilder::new()
        .with_policy(policy(4, 100, 2.0, 1000))
        .with_observer(observer.clone())
        .with_jitter(FixedJitter(1.0))
        .build()
        .execute(|| async { Err(ServiceError { status: 500, id: 0 }) })
        .await;

    assert!(result.is_err());
    assert_eq!(
        observer.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400)
        ]
    );
    assert_eq!(start.elapsed(), Duration::from_millis(700));
}

// ============================================================================
// Retry callback
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_on_retry_runs_before_each_delay() {
    let timeline = Arc::new(Timeline::new());

    let result: Result<(), ServiceError> = RetryExecutorBuilder::new()
        .with_policy(policy(4, 100, 2.0, 1000))
        .with_observer(timeline.clone())
        .with_jitter(FixedJitter(1.0))
        .build()
        .execute(|| async { Err(ServiceError { status: 502, id: 0 }) })
        .await;

    assert!(result.is_err());
    // Attempt N is reported once the delays before it have elapsed, but
    // before its own delay starts.
    assert_eq!(
        timeline.events(),
        vec![
            (1, Duration::ZERO),
            (2, Duration::from_millis(100)),
            (3, Duration::from_millis(300)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_on_retry_receives_the_failed_attempts_error() {
    let seen = Mutex::new(Vec::new());
    let calls = AtomicU32::new(0);

    let _: Result<(), ServiceError> = RetryExecutorBuilder::new()
        .with_policy(policy(3, 10, 2.0, 100))
        .with_on_retry(|err: &ServiceError, attempt: u32| {
            seen.lock().unwrap().push((err.id, attempt));
        })
        .build()
        .execute(|| async {
            let id = calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError { status: 500, id })
        })
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (1, 2)]);
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_success_after_two_failures() {
    let calls = AtomicU32::new(0);
    let retries = AtomicU32::new(0);

    let result = RetryExecutorBuilder::new()
        .with_policy(policy(3, 300, 2.0, 5000))
        .with_predicate(StatusClassifier::default())
        .with_on_retry(|_: &ServiceError, _: u32| {
            retries.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .execute(|| async {
            let id = calls.fetch_add(1, Ordering::SeqCst);
            if id < 2 {
                Err(ServiceError { status: 503, id })
            } else {
                Ok("ok")
            }
        })
        .await;

    assert_eq!(result, Ok("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(retries.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_the_last_error_unchanged() {
    let calls = AtomicU32::new(0);

    let result: Result<(), ServiceError> = retry(
        || async {
            let id = calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError { status: 500, id })
        },
        &RetryPolicyOverrides::new().max_attempts(3),
    )
    .await;

    assert_eq!(result, Err(ServiceError { status: 500, id: 2 }));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_executions_are_independent() {
    let executor = RetryExecutorBuilder::new()
        .with_policy(policy(3, 100, 2.0, 1000))
        .with_predicate(StatusClassifier::default())
        .with_jitter(FixedJitter(1.0))
        .build();

    let flaky_calls = AtomicU32::new(0);
    let failing_calls = AtomicU32::new(0);

    let flaky = executor.execute(|| async {
        let id = flaky_calls.fetch_add(1, Ordering::SeqCst);
        if id == 0 {
            Err(ServiceError { status: 429, id })
        } else {
            Ok(id)
        }
    });
    let failing = executor.execute(|| async {
        let id = failing_calls.fetch_add(1, Ordering::SeqCst);
        Err::<u32, _>(ServiceError { status: 400, id })
    });

    let (flaky, failing) = tokio::join!(flaky, failing);

    assert_eq!(flaky, Ok(1));
    assert_eq!(failing.unwrap_err().status, 400);
    assert_eq!(flaky_calls.load(Ordering::SeqCst), 2);
    assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_around_execute_aborts_pending_delay() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let executor = RetryExecutorBuilder::new()
        .with_policy(policy(5, 1000, 2.0, 10_000))
        .with_jitter(FixedJitter(1.0))
        .build();

    let run = executor.execute(|| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(ServiceError { status: 503, id: 0 })
    });

    let outcome = tokio::time::timeout(Duration::from_millis(50), run).await;

    assert!(outcome.is_err());
    assert_eq!(start.elapsed(), Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
