//! Retry coordinator behavior against scripted probes.
//!
//! All tests run on paused `tokio` time so delays and deadlines are exact.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use preflight_core::config::{BackendKind, CoordinationConfig};
use preflight_core::error::ErrorClass;
use preflight_core::{
    CancellationToken, ConnectionConfig, FailureReason, Probe, ProbeOutcome, ReadinessReport,
    ResolvedTarget, RetryPolicy, resolve, verify,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn retryable(message: &str) -> ProbeOutcome {
    ProbeOutcome::RetryableFailure(FailureReason::new(ErrorClass::RetryableConnection, message))
}

fn fatal(message: &str) -> ProbeOutcome {
    ProbeOutcome::FatalFailure(FailureReason::new(ErrorClass::FatalConnection, message))
}

/// Replays a fixed list of outcomes, then keeps failing retryably.
struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeOutcome>>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    fn new(script: impl IntoIterator<Item = ProbeOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::Coordination
    }

    async fn probe(&self, _target: &ResolvedTarget, _timeout: Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| retryable("connection refused"))
    }
}

/// Sets a flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Never answers; records the bound it was given and whether it was dropped.
#[derive(Default)]
struct HangingProbe {
    dropped: Arc<AtomicBool>,
    bounds: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Probe for HangingProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::Coordination
    }

    async fn probe(&self, _target: &ResolvedTarget, timeout: Duration) -> ProbeOutcome {
        self.bounds.lock().unwrap().push(timeout);
        let _guard = DropFlag(Arc::clone(&self.dropped));
        std::future::pending::<()>().await;
        ProbeOutcome::Success
    }
}

fn target() -> ResolvedTarget {
    resolve(&ConnectionConfig::from(CoordinationConfig::new(vec![
        "zk1:2181".to_string(),
    ])))
    .unwrap()
}

async fn run(probe: &dyn Probe, policy: &RetryPolicy) -> ReadinessReport {
    verify(probe, &target(), policy, &CancellationToken::new()).await
}

#[tokio::test(start_paused = true)]
async fn test_ready_after_two_retryable_failures() {
    let probe = ScriptedProbe::new([
        retryable("connection refused"),
        retryable("connection refused"),
        ProbeOutcome::Success,
    ]);
    let policy = RetryPolicy::new(5).with_fixed_delay(Duration::from_secs(1));

    let report = run(&probe, &policy).await;

    assert!(report.ready);
    assert_eq!(report.attempts, 3);
    assert_eq!(probe.calls(), 3);
    assert_eq!(report.elapsed, Duration::from_secs(2));
    assert_eq!(report.failure, None);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_stops_immediately() {
    let probe = ScriptedProbe::new([fatal("Authentication failed.")]);
    let report = run(&probe, &RetryPolicy::new(10)).await;

    assert!(!report.ready);
    assert_eq!(report.attempts, 1);
    assert_eq!(probe.calls(), 1);
    assert_eq!(report.failure, Some(ErrorClass::FatalConnection));
    assert_eq!(report.message.as_deref(), Some("Authentication failed."));
    assert_eq!(report.elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhaustion_reports_last_error() {
    let probe = ScriptedProbe::new([
        retryable("first"),
        retryable("second"),
        retryable("third"),
        retryable("fourth"),
    ]);
    let policy = RetryPolicy::new(4).with_fixed_delay(Duration::from_millis(500));

    let report = run(&probe, &policy).await;

    assert!(!report.ready);
    assert_eq!(report.attempts, 4);
    assert_eq!(probe.calls(), 4);
    assert_eq!(report.failure, Some(ErrorClass::RetryableConnection));
    assert_eq!(report.message.as_deref(), Some("fourth"));
    // no wait after the final attempt
    assert_eq!(report.elapsed, Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_delays() {
    let probe = ScriptedProbe::new([
        retryable("down"),
        retryable("down"),
        retryable("down"),
        ProbeOutcome::Success,
    ]);
    let policy = RetryPolicy::new(10)
        .with_exponential_backoff(Duration::from_secs(1), Duration::from_secs(3));

    let report = run(&probe, &policy).await;

    assert!(report.ready);
    assert_eq!(report.attempts, 4);
    // 1s + 2s + min(4s, 3s)
    assert_eq!(report.elapsed, Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_total_time() {
    let probe = HangingProbe::default();
    let policy = RetryPolicy::new(100)
        .with_fixed_delay(Duration::from_secs(1))
        .with_attempt_timeout(Duration::from_secs(5))
        .with_deadline(Duration::from_secs(12));

    let report = run(&probe, &policy).await;

    assert!(!report.ready);
    assert_eq!(report.attempts, 2);
    assert_eq!(report.elapsed, Duration::from_secs(12));
    assert_eq!(report.failure, Some(ErrorClass::TimeoutExceeded));

    let message = report.message.unwrap();
    assert!(message.contains("deadline of 12000ms exceeded"), "{}", message);
    assert!(message.contains("attempt timed out after 5000ms"), "{}", message);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_bound_clamped_to_remaining_deadline() {
    let probe = HangingProbe::default();
    let policy = RetryPolicy::new(3)
        .with_attempt_timeout(Duration::from_secs(5))
        .with_deadline(Duration::from_secs(3));

    let report = run(&probe, &policy).await;

    assert_eq!(*probe.bounds.lock().unwrap(), vec![Duration::from_secs(3)]);
    assert!(probe.dropped.load(Ordering::SeqCst));
    assert_eq!(report.attempts, 1);
    assert_eq!(report.elapsed, Duration::from_secs(3));
    assert_eq!(report.failure, Some(ErrorClass::TimeoutExceeded));
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_attempt_is_retryable_timeout() {
    let probe = HangingProbe::default();
    let policy = RetryPolicy::new(2)
        .with_fixed_delay(Duration::from_millis(100))
        .with_attempt_timeout(Duration::from_millis(250));

    let report = run(&probe, &policy).await;

    assert_eq!(report.attempts, 2);
    assert_eq!(report.failure, Some(ErrorClass::RetryableConnection));
    assert_eq!(
        report.message.as_deref(),
        Some("attempt timed out after 250ms")
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_drops_in_flight_attempt() {
    let probe = HangingProbe::default();
    let cancel = CancellationToken::new();
    let policy = RetryPolicy::new(5).with_attempt_timeout(Duration::from_secs(60));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let report = verify(&probe, &target(), &policy, &cancel).await;

    assert!(!report.ready);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.failure, Some(ErrorClass::Cancelled));
    assert_eq!(report.elapsed, Duration::from_secs(2));
    assert!(probe.dropped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_wait() {
    let probe = ScriptedProbe::new([retryable("down")]);
    let cancel = CancellationToken::new();
    let policy = RetryPolicy::new(5).with_fixed_delay(Duration::from_secs(10));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let report = verify(&probe, &target(), &policy, &cancel).await;

    assert_eq!(report.attempts, 1);
    assert_eq!(probe.calls(), 1);
    assert_eq!(report.failure, Some(ErrorClass::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_identical_outcomes_give_identical_reports() {
    let script = || {
        [
            retryable("down"),
            retryable("down"),
            fatal("access denied"),
        ]
    };
    let policy = RetryPolicy::new(5).with_fixed_delay(Duration::from_millis(200));

    let first = run(&ScriptedProbe::new(script()), &policy).await;
    let second = run(&ScriptedProbe::new(script()), &policy).await;

    assert_eq!(first.attempts, 3);
    assert_eq!(first.attempts, second.attempts);
    assert_eq!(first.ready, second.ready);
    assert_eq!(first.failure, second.failure);
    assert_eq!(first.message, second.message);
    assert_eq!(first.elapsed, second.elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_zero_budget_still_makes_one_attempt() {
    let probe = ScriptedProbe::new([retryable("down")]);
    let policy = RetryPolicy {
        max_attempts: 0,
        ..RetryPolicy::default()
    };

    let report = run(&probe, &policy).await;

    assert_eq!(report.attempts, 1);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_after_retryable_makes_two_attempts() {
    let probe = ScriptedProbe::new([retryable("not primary"), fatal("Unauthorized")]);
    let report = run(&probe, &RetryPolicy::new(10)).await;

    assert!(!report.ready);
    assert_eq!(report.attempts, 2);
    assert_eq!(probe.calls(), 2);
    assert_eq!(report.failure, Some(ErrorClass::FatalConnection));
}

#[tokio::test(start_paused = true)]
async fn test_document_store_max_retry_drives_budget() {
    use preflight_core::config::DocumentStoreConfig;
    use preflight_core::{DependencySpec, MemorySink, check_with_probe};

    let dependency = DependencySpec::new(
        "mongo",
        DocumentStoreConfig::new(vec!["db1:27017".into(), "db2:27017".into()], "app")
            .with_max_retry(3),
    );
    let probe = ScriptedProbe::new([
        retryable("server selection timeout"),
        retryable("server selection timeout"),
        ProbeOutcome::Success,
    ]);

    let report = check_with_probe(
        &dependency,
        &RetryPolicy::new(1),
        &probe,
        Arc::new(MemorySink::new()),
        &CancellationToken::new(),
    )
    .await;

    assert!(report.ready, "{}", report);
    assert_eq!(report.attempts, 3);
    assert_eq!(
        report.target,
        "mongodb://db1:27017,db2:27017/app?authSource=admin&maxPoolSize=100"
    );
}
