//! Retry coordinator.
//!
//! Drives one probe through the state machine
//!
//! ```text
//! Pending -> Probing -> Success ----------------------------> Done (ready)
//!               |   \-> FatalFailure -----------------------> Done (not ready)
//!               \-----> RetryableFailure -> Waiting -> Probing
//!                                       \-> Done (budget or deadline spent)
//! ```
//!
//! Attempt counting and deadline checks happen only here. Each attempt is
//! bounded by `min(attempt_timeout, remaining deadline)` and the wait between
//! attempts is clamped to the remaining deadline. Cancellation drops the
//! in-flight attempt and ends the sequence.

use crate::config::RetryPolicy;
use crate::error::ErrorClass;
use crate::probe::{FailureReason, Probe, ProbeOutcome};
use crate::report::ReadinessReport;
use crate::resolver::ResolvedTarget;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Coordinator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Nothing attempted yet
    Pending,
    /// About to run an attempt
    Probing,
    /// Pausing before the next attempt
    Waiting(Duration),
    /// Sequence finished
    Done(Verdict),
}

/// How a sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Dependency is ready
    Ready,
    /// Dependency is not ready
    NotReady(FailureReason),
}

/// Verifies one target under a retry policy.
///
/// Never fails: every way a sequence can end is expressed in the returned
/// report. The report carries the target's redacted descriptor and the
/// backend kind as its default name.
pub async fn verify(
    probe: &dyn Probe,
    target: &ResolvedTarget,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> ReadinessReport {
    let mut coordinator = Coordinator::new(probe, target, policy, cancel);
    let mut state = RetryState::Pending;

    let verdict = loop {
        state = match state {
            RetryState::Done(verdict) => break verdict,
            state => coordinator.step(state).await,
        };
    };

    coordinator.report(verdict)
}

struct Coordinator<'a> {
    probe: &'a dyn Probe,
    target: &'a ResolvedTarget,
    policy: &'a RetryPolicy,
    cancel: &'a CancellationToken,
    started: Instant,
    deadline: Option<Instant>,
    max_attempts: u32,
    attempts: u32,
    last_failure: Option<FailureReason>,
}

impl<'a> Coordinator<'a> {
    fn new(
        probe: &'a dyn Probe,
        target: &'a ResolvedTarget,
        policy: &'a RetryPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        let started = Instant::now();
        Self {
            probe,
            target,
            policy,
            cancel,
            started,
            deadline: policy.deadline.and_then(|d| started.checked_add(d)),
            max_attempts: policy.max_attempts.max(1),
            attempts: 0,
            last_failure: None,
        }
    }

    async fn step(&mut self, state: RetryState) -> RetryState {
        match state {
            RetryState::Pending => {
                debug!(
                    "Verifying {} (max {} attempt(s))",
                    self.target.redacted(),
                    self.max_attempts
                );
                RetryState::Probing
            }
            RetryState::Probing => self.attempt().await,
            RetryState::Waiting(delay) => {
                debug!("Waiting {}ms before the next attempt", delay.as_millis());
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => RetryState::Done(cancelled()),
                    _ = tokio::time::sleep(delay) => RetryState::Probing,
                }
            }
            done @ RetryState::Done(_) => done,
        }
    }

    async fn attempt(&mut self) -> RetryState {
        if self.cancel.is_cancelled() {
            return RetryState::Done(cancelled());
        }

        let bound = match remaining(self.deadline) {
            Some(left) if left.is_zero() => {
                return RetryState::Done(deadline_exceeded(
                    self.policy,
                    self.last_failure.as_ref(),
                ));
            }
            Some(left) => self.policy.attempt_timeout.min(left),
            None => self.policy.attempt_timeout,
        };

        self.attempts = self.attempts.saturating_add(1);
        debug!(
            "Probing {} (attempt {}/{}, bound {}ms)",
            self.target.redacted(),
            self.attempts,
            self.max_attempts,
            bound.as_millis()
        );

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return RetryState::Done(cancelled()),
            outcome = tokio::time::timeout(bound, self.probe.probe(self.target, bound)) => {
                outcome.unwrap_or_else(|_| ProbeOutcome::timed_out(bound))
            }
        };

        match outcome {
            ProbeOutcome::Success => RetryState::Done(Verdict::Ready),
            ProbeOutcome::FatalFailure(reason) => {
                warn!(
                    "Attempt {} against {} failed fatally: {}",
                    self.attempts,
                    self.target.redacted(),
                    reason
                );
                RetryState::Done(Verdict::NotReady(reason))
            }
            ProbeOutcome::RetryableFailure(reason) => {
                warn!(
                    "Attempt {} against {} failed: {}",
                    self.attempts,
                    self.target.redacted(),
                    reason
                );
                if self.attempts >= self.max_attempts {
                    debug!("Attempt budget of {} exhausted", self.max_attempts);
                    return RetryState::Done(Verdict::NotReady(reason));
                }

                let delay = self.policy.backoff.delay_after(self.attempts);
                let next = match remaining(self.deadline) {
                    Some(left) if left.is_zero() => {
                        RetryState::Done(deadline_exceeded(self.policy, Some(&reason)))
                    }
                    Some(left) => RetryState::Waiting(delay.min(left)),
                    None => RetryState::Waiting(delay),
                };
                self.last_failure = Some(reason);
                next
            }
        }
    }

    fn report(&self, verdict: Verdict) -> ReadinessReport {
        let elapsed = self.started.elapsed();
        let target = self.target;

        match verdict {
            Verdict::Ready => {
                info!(
                    "{} is ready after {} attempt(s) in {}ms",
                    target.redacted(),
                    self.attempts,
                    elapsed.as_millis()
                );
                ReadinessReport::ready(target.kind(), target.redacted(), self.attempts, elapsed)
            }
            Verdict::NotReady(reason) => {
                warn!(
                    "{} is not ready after {} attempt(s): {}",
                    target.redacted(),
                    self.attempts,
                    reason
                );
                ReadinessReport::not_ready(
                    target.kind(),
                    target.redacted(),
                    self.attempts,
                    elapsed,
                    reason.class,
                    reason.message,
                )
            }
        }
    }
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

fn cancelled() -> Verdict {
    debug!("Verification cancelled");
    Verdict::NotReady(FailureReason::new(
        ErrorClass::Cancelled,
        "verification cancelled",
    ))
}

fn deadline_exceeded(policy: &RetryPolicy, last: Option<&FailureReason>) -> Verdict {
    let limit = policy.deadline.unwrap_or_default().as_millis();
    let message = match last {
        Some(reason) => format!("deadline of {}ms exceeded; last error: {}", limit, reason.message),
        None => format!("deadline of {}ms exceeded", limit),
    };
    Verdict::NotReady(FailureReason::new(ErrorClass::TimeoutExceeded, message))
}
