//! Readiness reports.
//!
//! A [`ReadinessReport`] is the single immutable result of one verification
//! sequence: the verdict, how many attempts it took, how long, and on failure
//! the classification and last diagnostic message. It renders to one line for
//! humans and serializes to JSON for machines.

use crate::config::BackendKind;
use crate::error::{ErrorClass, PreflightError, redact_credentials_in_text};
use crate::sink::{DiagnosticSink, Severity};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Shown for failed reports that carry no message.
pub const UNKNOWN_FAILURE: &str = "unknown failure";

/// Shown as target when resolution failed before a descriptor existed.
pub const UNRESOLVED_TARGET: &str = "<unresolved>";

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Final verdict for one dependency.
///
/// # Example
/// ```rust
/// use preflight_core::config::BackendKind;
/// use preflight_core::report::ReadinessReport;
/// use std::time::Duration;
///
/// let report = ReadinessReport::ready(
///     BackendKind::Coordination,
///     "zk://zk1:2181",
///     2,
///     Duration::from_millis(1500),
/// )
/// .with_name("zk");
/// assert_eq!(
///     report.summary(),
///     "[coordination] zk zk://zk1:2181 ready after 2 attempt(s) in 1500ms"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// Backend kind
    pub kind: BackendKind,
    /// Dependency name
    pub name: String,
    /// Redacted target descriptor
    pub target: String,
    /// Verdict
    pub ready: bool,
    /// Attempts made
    pub attempts: u32,
    /// Total elapsed time
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Failure classification when not ready
    pub failure: Option<ErrorClass>,
    /// Last diagnostic message when not ready
    pub message: Option<String>,
    /// When the verdict was reached
    pub checked_at: DateTime<Utc>,
}

impl ReadinessReport {
    /// Report for a dependency that became ready.
    pub fn ready(
        kind: BackendKind,
        target: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind,
            name: kind.as_str().to_string(),
            target: target.into(),
            ready: true,
            attempts,
            elapsed,
            failure: None,
            message: None,
            checked_at: Utc::now(),
        }
    }

    /// Report for a dependency that is not ready.
    pub fn not_ready(
        kind: BackendKind,
        target: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
        failure: ErrorClass,
        message: impl AsRef<str>,
    ) -> Self {
        let message = message.as_ref();
        Self {
            kind,
            name: kind.as_str().to_string(),
            target: target.into(),
            ready: false,
            attempts,
            elapsed,
            failure: Some(failure),
            message: (!message.is_empty()).then(|| redact_credentials_in_text(message)),
            checked_at: Utc::now(),
        }
    }

    /// Report for a dependency whose configuration never got to a probe.
    pub fn from_error(kind: BackendKind, error: &PreflightError) -> Self {
        Self::not_ready(
            kind,
            UNRESOLVED_TARGET,
            0,
            Duration::ZERO,
            error.class(),
            error.to_string(),
        )
    }

    /// Builder method to set the dependency name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Single-line human-readable summary.
    pub fn summary(&self) -> String {
        let head = format!(
            "[{}] {} {} {} after {} attempt(s) in {}ms",
            self.kind,
            self.name,
            self.target,
            if self.ready { "ready" } else { "not ready" },
            self.attempts,
            self.elapsed.as_millis()
        );

        if self.ready {
            return head;
        }

        let message = self
            .message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(|| UNKNOWN_FAILURE.to_string(), redact_credentials_in_text);

        match self.failure {
            Some(class) => format!("{}: {}: {}", head, class, message),
            None => format!("{}: {}", head, message),
        }
    }

    /// Converts a not-ready verdict into the matching [`PreflightError`].
    ///
    /// Returns `None` for a ready dependency. The context names the
    /// dependency and carries the redacted last message.
    pub fn to_error(&self) -> Option<PreflightError> {
        if self.ready {
            return None;
        }

        let message = self
            .message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(|| UNKNOWN_FAILURE.to_string(), redact_credentials_in_text);
        let context = format!("{} ({}): {}", self.name, self.target, message);

        Some(match self.failure {
            Some(ErrorClass::Configuration) => PreflightError::Configuration { message: context },
            Some(ErrorClass::TlsConfiguration) => PreflightError::tls(context),
            Some(ErrorClass::FatalConnection) => PreflightError::FatalConnection { context },
            Some(ErrorClass::TimeoutExceeded) => PreflightError::TimeoutExceeded { context },
            Some(ErrorClass::Cancelled) => PreflightError::Cancelled,
            Some(ErrorClass::RetryableConnection) | None => {
                PreflightError::RetryableConnection { context }
            }
        })
    }

    /// Writes the summary to a sink with `Success` or `Error` severity.
    pub fn emit(&self, sink: &dyn DiagnosticSink) {
        let severity = if self.ready {
            Severity::Success
        } else {
            Severity::Error
        };
        sink.emit(severity, &self.summary());
    }
}

impl std::fmt::Display for ReadinessReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}
