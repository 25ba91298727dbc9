//! Backend probes.
//!
//! A probe makes exactly one connection attempt against one resolved target
//! and reports a [`ProbeOutcome`]. Probes keep no retry bookkeeping; the
//! [`retry`](crate::retry) coordinator owns attempt counting and deadlines.
//!
//! Vendor clients sit behind narrow traits (`DocumentStoreClient`,
//! `BrokerClient`, `CoordinationClient`, `ObjectStoreClient`) so probes can be
//! exercised with fakes. Failures are mapped into a vendor-neutral
//! [`BackendError`] and classified per backend kind.

pub mod broker;
mod classify;
pub mod coordination;
pub mod document;
pub mod object_store;

pub use classify::{
    BackendError, BackendErrorKind, BrokerClassifier, CoordinationClassifier, Disposition,
    DocumentStoreClassifier, ErrorClassifier, ObjectStoreClassifier, classifier_for,
};

use crate::config::BackendKind;
use crate::error::{ErrorClass, redact_credentials_in_text};
use crate::resolver::ResolvedTarget;
use crate::sink::SharedSink;
use async_trait::async_trait;
use std::time::Duration;

/// Classified reason for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    /// Classification tag
    pub class: ErrorClass,
    /// Display message with URL credentials masked
    pub message: String,
}

impl FailureReason {
    /// Creates a reason, masking any credentials embedded in the message.
    pub fn new(class: ErrorClass, message: impl AsRef<str>) -> Self {
        Self {
            class,
            message: redact_credentials_in_text(message.as_ref()),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend is live
    Success,
    /// Worth another attempt
    RetryableFailure(FailureReason),
    /// Retrying cannot help
    FatalFailure(FailureReason),
}

impl ProbeOutcome {
    /// Classifies a backend error into an outcome.
    pub fn from_error(classifier: &dyn ErrorClassifier, error: &BackendError) -> Self {
        match classifier.classify(error) {
            Disposition::Retryable => Self::RetryableFailure(FailureReason::new(
                ErrorClass::RetryableConnection,
                error.message(),
            )),
            Disposition::Fatal => Self::FatalFailure(FailureReason::new(
                ErrorClass::FatalConnection,
                error.message(),
            )),
        }
    }

    /// Retryable outcome for an attempt that overran its bound.
    pub fn timed_out(timeout: Duration) -> Self {
        Self::RetryableFailure(FailureReason::new(
            ErrorClass::RetryableConnection,
            format!("attempt timed out after {}ms", timeout.as_millis()),
        ))
    }

    /// Fatal outcome for a target handed to the wrong probe.
    pub fn wrong_target(expected: BackendKind, target: &ResolvedTarget) -> Self {
        Self::FatalFailure(FailureReason::new(
            ErrorClass::Configuration,
            format!("{} probe cannot check a {} target", expected, target.kind()),
        ))
    }

    /// Whether the attempt succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Failure reason, if any.
    pub const fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Success => None,
            Self::RetryableFailure(reason) | Self::FatalFailure(reason) => Some(reason),
        }
    }
}

/// One connectivity check against one backend kind.
///
/// Implementations open exactly one connection or session, run a minimal
/// liveness check, and release the connection on every exit path. A probe
/// future dropped mid-attempt must release its connection through `Drop`.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Backend kind this probe checks.
    fn kind(&self) -> BackendKind;

    /// Performs one attempt bounded by `timeout`.
    async fn probe(&self, target: &ResolvedTarget, timeout: Duration) -> ProbeOutcome;
}

/// Builds the probe for a backend kind using the compiled-in clients.
pub fn default_probe(kind: BackendKind, sink: SharedSink) -> Box<dyn Probe> {
    match kind {
        BackendKind::DocumentStore => Box::new(document::DocumentStoreProbe::with_default_client()),
        BackendKind::Broker => Box::new(broker::BrokerProbe::with_default_client(sink)),
        BackendKind::Coordination => {
            Box::new(coordination::CoordinationProbe::with_default_client(sink))
        }
        BackendKind::ObjectStore => {
            Box::new(object_store::ObjectStoreProbe::with_default_client(sink))
        }
    }
}
