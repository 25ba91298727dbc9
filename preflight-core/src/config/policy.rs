//! Retry policy for the verification loop.

use super::duration_ms;
use crate::error::PreflightError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default pause between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
/// Default bound on a single probe attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay after every failure
    Fixed {
        /// Pause between attempts
        #[serde(rename = "delay_ms", with = "duration_ms")]
        delay: Duration,
    },
    /// `base * 2^(n-1)` after the n-th failure, capped at `max`
    Exponential {
        /// Delay after the first failure
        #[serde(rename = "base_ms", with = "duration_ms")]
        base: Duration,
        /// Upper bound for any delay
        #[serde(rename = "max_ms", with = "duration_ms")]
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed {
            delay: DEFAULT_DELAY,
        }
    }
}

impl Backoff {
    /// Delay to wait after `failed_attempts` consecutive failures (1-based).
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        match *self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, max } => {
                let exponent = failed_attempts.saturating_sub(1).min(31);
                base.checked_mul(2u32.saturating_pow(exponent))
                    .map_or(max, |delay| delay.min(max))
            }
        }
    }
}

/// Attempt budget, inter-attempt delay and overall deadline.
///
/// # Example
/// ```rust
/// use preflight_core::config::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(5)
///     .with_fixed_delay(Duration::from_millis(200))
///     .with_deadline(Duration::from_secs(10));
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of probe attempts, at least 1
    pub max_attempts: u32,
    /// Delay strategy between attempts
    pub backoff: Backoff,
    /// Overall bound on the verification sequence
    #[serde(rename = "deadline_ms", with = "duration_ms::option")]
    pub deadline: Option<Duration>,
    /// Bound handed to each individual probe attempt
    #[serde(rename = "attempt_timeout_ms", with = "duration_ms")]
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            deadline: None,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Builder method for a fixed delay.
    pub const fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.backoff = Backoff::Fixed { delay };
        self
    }

    /// Builder method for exponential backoff.
    pub const fn with_exponential_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff = Backoff::Exponential { base, max };
        self
    }

    /// Builder method for the overall deadline.
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builder method for the per-attempt timeout.
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Replaces the attempt budget when a connection config carries one.
    #[must_use]
    pub fn with_max_retry_override(mut self, max_retry: Option<u32>) -> Self {
        if let Some(max) = max_retry {
            self.max_attempts = max;
        }
        self
    }

    /// Validates policy parameters.
    ///
    /// # Errors
    /// Returns `Configuration` when the attempt budget is zero, the attempt
    /// timeout is zero, or exponential backoff has `max < base`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_attempts == 0 {
            return Err(PreflightError::configuration(
                "max_attempts must be at least 1",
            ));
        }

        if self.attempt_timeout.is_zero() {
            return Err(PreflightError::configuration(
                "attempt_timeout must be greater than 0",
            ));
        }

        if let Backoff::Exponential { base, max } = self.backoff
            && max < base
        {
            return Err(PreflightError::configuration(
                "exponential backoff max must not be below its base",
            ));
        }

        Ok(())
    }
}
