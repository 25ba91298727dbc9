//! Coordination service (ZooKeeper) probe.
//!
//! Connects with the attempt timeout and polls the session state every
//! 100 ms. The dependency is live only once the state reaches
//! [`SessionState::HasSession`]; with credentials configured that happens
//! after the digest authentication reply.

mod protocol;
mod session;

pub use session::ZooKeeperClient;

use super::{BackendError, BackendErrorKind, CoordinationClassifier, Probe, ProbeOutcome};
use crate::config::BackendKind;
use crate::resolver::ResolvedTarget;
use crate::sink::SharedSink;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Interval between session state checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `SessionExpired`
const SESSION_EXPIRED: i64 = -112;

/// Session lifecycle as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection
    Disconnected,
    /// Dialing an ensemble member
    Connecting,
    /// Transport up, no session yet
    Connected,
    /// Session established and usable
    HasSession,
    /// Server rejected the credentials
    AuthFailed,
    /// Server refused or expired the session
    Expired,
}

/// Opens coordination sessions.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Starts connecting; the returned session may not be established yet.
    async fn connect(
        &self,
        target: &ResolvedTarget,
        timeout: Duration,
    ) -> Result<Box<dyn CoordinationSession>, BackendError>;
}

/// One coordination session.
#[async_trait]
pub trait CoordinationSession: Send + Sync {
    /// Current state.
    fn state(&self) -> SessionState;

    /// Closes the session.
    async fn close(&mut self);
}

/// Probe for the coordination service.
pub struct CoordinationProbe {
    client: Box<dyn CoordinationClient>,
    classifier: CoordinationClassifier,
}

impl CoordinationProbe {
    /// Creates a probe over a client implementation.
    pub fn new(client: impl CoordinationClient + 'static) -> Self {
        Self {
            client: Box::new(client),
            classifier: CoordinationClassifier,
        }
    }

    /// Creates a probe over the built-in client, reporting to `sink`.
    pub fn with_default_client(sink: SharedSink) -> Self {
        Self::new(ZooKeeperClient::new(sink))
    }

    /// Polls until the session settles or `timeout`, measured from
    /// `started`, runs out.
    async fn await_session(
        &self,
        session: &dyn CoordinationSession,
        started: Instant,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        loop {
            match session.state() {
                SessionState::HasSession => return Ok(()),
                SessionState::AuthFailed => {
                    return Err(BackendError::status(
                        CoordinationClassifier::AUTH_FAILED,
                        "digest authentication rejected",
                    ));
                }
                SessionState::Expired => {
                    return Err(BackendError::status(
                        SESSION_EXPIRED,
                        "session expired during handshake",
                    ));
                }
                SessionState::Disconnected => {
                    return Err(BackendError::new(
                        BackendErrorKind::TransportReset,
                        "connection dropped before a session was established",
                    ));
                }
                SessionState::Connecting | SessionState::Connected => {}
            }

            let left = timeout.saturating_sub(started.elapsed());
            if left.is_zero() {
                return Err(BackendError::timeout(format!(
                    "session not established within {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(left)).await;
        }
    }
}

#[async_trait]
impl Probe for CoordinationProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::Coordination
    }

    async fn probe(&self, target: &ResolvedTarget, timeout: Duration) -> ProbeOutcome {
        if target.kind() != BackendKind::Coordination {
            return ProbeOutcome::wrong_target(self.kind(), target);
        }

        // One budget covers dialing and the handshake
        let started = Instant::now();
        let mut session = match self.client.connect(target, timeout).await {
            Ok(session) => session,
            Err(e) => return ProbeOutcome::from_error(&self.classifier, &e),
        };

        let result = self
            .await_session(session.as_ref(), started, timeout)
            .await;
        session.close().await;

        match result {
            Ok(()) => ProbeOutcome::Success,
            Err(e) => ProbeOutcome::from_error(&self.classifier, &e),
        }
    }
}
