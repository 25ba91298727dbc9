//! Vendor-neutral backend errors and per-kind classification.

use crate::config::BackendKind;
use thiserror::Error;

/// What went wrong, independent of the vendor client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Credentials rejected
    Authentication,
    /// Authenticated but not permitted
    Authorization,
    /// The backend refuses the target as given
    MalformedTarget,
    /// Nothing listening
    ConnectionRefused,
    /// No answer in time
    Timeout,
    /// Host name did not resolve
    NameResolution,
    /// Connection dropped mid-exchange
    TransportReset,
    /// Backend-specific status or error code
    Status(i64),
    /// Backend reachable but reports itself offline
    Offline,
    /// Anything else
    Other,
}

/// A failure reported by a backend client.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    /// Creates an error of the given kind.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`BackendErrorKind::Status`].
    pub fn status(code: i64, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Status(code), message)
    }

    /// Shorthand for [`BackendErrorKind::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    /// Maps a socket error onto the transport kinds.
    pub fn from_io(context: &str, error: &std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match error.kind() {
            Io::ConnectionRefused => BackendErrorKind::ConnectionRefused,
            Io::TimedOut | Io::WouldBlock => BackendErrorKind::Timeout,
            Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::BrokenPipe
            | Io::UnexpectedEof
            | Io::NotConnected => BackendErrorKind::TransportReset,
            Io::InvalidInput | Io::InvalidData => BackendErrorKind::MalformedTarget,
            _ => BackendErrorKind::Other,
        };
        Self::new(kind, format!("{}: {}", context, error))
    }

    /// Error kind.
    pub const fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    /// Display message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Whether retrying could plausibly help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retry under the policy
    Retryable,
    /// Stop immediately
    Fatal,
}

/// Per-kind classification of backend errors.
///
/// The default [`classify`](ErrorClassifier::classify) treats authentication,
/// authorization and malformed targets as fatal, defers status codes to
/// [`is_fatal_status`](ErrorClassifier::is_fatal_status), and retries the rest.
pub trait ErrorClassifier: Send + Sync {
    /// Backend-specific status codes that must not be retried.
    fn is_fatal_status(&self, code: i64) -> bool;

    /// Classifies one error.
    fn classify(&self, error: &BackendError) -> Disposition {
        match error.kind() {
            BackendErrorKind::Authentication
            | BackendErrorKind::Authorization
            | BackendErrorKind::MalformedTarget => Disposition::Fatal,
            BackendErrorKind::Status(code) if self.is_fatal_status(code) => Disposition::Fatal,
            _ => Disposition::Retryable,
        }
    }
}

/// Document store: `Unauthorized` (13) and `AuthenticationFailed` (18).
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentStoreClassifier;

impl DocumentStoreClassifier {
    const FATAL: [i64; 2] = [13, 18];
}

impl ErrorClassifier for DocumentStoreClassifier {
    fn is_fatal_status(&self, code: i64) -> bool {
        Self::FATAL.contains(&code)
    }
}

/// Broker: SASL and authorization failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerClassifier;

impl BrokerClassifier {
    // SaslAuthenticationFailed, Topic/Group/ClusterAuthorizationFailed,
    // UnsupportedSaslMechanism, IllegalSaslState, client-local Authentication
    const FATAL: [i64; 7] = [58, 29, 30, 31, 33, 34, -169];
}

impl ErrorClassifier for BrokerClassifier {
    fn is_fatal_status(&self, code: i64) -> bool {
        Self::FATAL.contains(&code)
    }
}

/// Coordination service: `NoAuth`, `AuthFailed` and `BadArguments`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinationClassifier;

impl CoordinationClassifier {
    /// `NoAuth`
    pub const NO_AUTH: i64 = -102;
    /// `AuthFailed`
    pub const AUTH_FAILED: i64 = -115;
    /// `BadArguments`
    pub const BAD_ARGUMENTS: i64 = -8;
}

impl ErrorClassifier for CoordinationClassifier {
    fn is_fatal_status(&self, code: i64) -> bool {
        matches!(
            code,
            Self::NO_AUTH | Self::AUTH_FAILED | Self::BAD_ARGUMENTS
        )
    }
}

/// Object store: HTTP 400, 401 and 403.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectStoreClassifier;

impl ErrorClassifier for ObjectStoreClassifier {
    fn is_fatal_status(&self, code: i64) -> bool {
        matches!(code, 400 | 401 | 403)
    }
}

/// Classifier for a backend kind.
pub fn classifier_for(kind: BackendKind) -> &'static dyn ErrorClassifier {
    match kind {
        BackendKind::DocumentStore => &DocumentStoreClassifier,
        BackendKind::Broker => &BrokerClassifier,
        BackendKind::Coordination => &CoordinationClassifier,
        BackendKind::ObjectStore => &ObjectStoreClassifier,
    }
}
