//! Built-in ZooKeeper session client.
//!
//! Dials the first reachable ensemble member, then runs the session handshake
//! on a background task that publishes [`SessionState`] changes through a
//! `watch` channel. The task is cancelled on `close` and aborted on drop, so
//! a probe that is cancelled mid-attempt never leaks the connection.

use super::protocol::{
    AUTH_XID, auth_request, close_request, connect_request, parse_connect_response,
    parse_reply_header, read_frame, write_packet,
};
use super::{CoordinationClassifier, CoordinationClient, CoordinationSession, SessionState};
use crate::probe::{BackendError, BackendErrorKind};
use crate::resolver::{Endpoint, ResolvedTarget};
use crate::sink::{SharedSink, Severity, TracingSink};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// How long `close` waits for the close-session request to go out.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Coordination client speaking the ZooKeeper session protocol over TCP.
///
/// Connection chatter (failed dials, established sessions, drops) goes to the
/// injected sink rather than a global logger.
#[derive(Clone)]
pub struct ZooKeeperClient {
    sink: SharedSink,
}

impl ZooKeeperClient {
    /// Creates a client reporting to `sink`.
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }
}

impl Default for ZooKeeperClient {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

type DigestPair = (Zeroizing<String>, Zeroizing<String>);

struct ZooKeeperSession {
    state: watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl CoordinationClient for ZooKeeperClient {
    async fn connect(
        &self,
        target: &ResolvedTarget,
        timeout: Duration,
    ) -> Result<Box<dyn CoordinationSession>, BackendError> {
        let Endpoint::Coordination {
            addresses,
            session_timeout,
            ..
        } = target.endpoint()
        else {
            return Err(BackendError::new(
                BackendErrorKind::MalformedTarget,
                "not a coordination target",
            ));
        };

        let stream = self.dial(addresses, timeout).await?;

        let digest: Option<DigestPair> = target.credentials().map(|c| {
            (
                Zeroizing::new(c.username().to_string()),
                Zeroizing::new(c.secret().expose().to_string()),
            )
        });
        let session_timeout_ms =
            i32::try_from(session_timeout.as_millis()).unwrap_or(i32::MAX);

        let (state_tx, state_rx) = watch::channel(SessionState::Connected);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_session(
            stream,
            session_timeout_ms,
            digest,
            state_tx,
            shutdown.clone(),
            Arc::clone(&self.sink),
        ));

        Ok(Box::new(ZooKeeperSession {
            state: state_rx,
            shutdown,
            task: Some(task),
        }))
    }
}

impl ZooKeeperClient {
    async fn dial(&self, addresses: &[String], timeout: Duration) -> Result<TcpStream, BackendError> {
        let started = tokio::time::Instant::now();
        let mut last_error = None;

        for address in addresses {
            let left = timeout.saturating_sub(started.elapsed());
            match tokio::time::timeout(left, TcpStream::connect(address.as_str())).await {
                Ok(Ok(stream)) => {
                    self.sink
                        .emit(Severity::Normal, &format!("connected to {}", address));
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    self.sink.emit(
                        Severity::Normal,
                        &format!("failed to connect to {}: {}", address, e),
                    );
                    last_error = Some(BackendError::from_io(&format!("connect to {}", address), &e));
                }
                Err(_) => {
                    return Err(BackendError::timeout(format!(
                        "no ensemble member reachable within {}ms",
                        timeout.as_millis()
                    )));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::new(BackendErrorKind::MalformedTarget, "empty ensemble")
        }))
    }
}

/// Outcome of the handshake phase.
enum Handshake {
    Established,
    Rejected,
}

async fn handshake(
    stream: &mut TcpStream,
    session_timeout_ms: i32,
    digest: Option<&DigestPair>,
    state: &watch::Sender<SessionState>,
    sink: &SharedSink,
) -> std::io::Result<Handshake> {
    write_packet(stream, &connect_request(session_timeout_ms)).await?;
    let response = parse_connect_response(&read_frame(stream).await?)?;

    if response.timeout_ms <= 0 {
        state.send_replace(SessionState::Expired);
        return Ok(Handshake::Rejected);
    }

    if let Some((username, password)) = digest {
        write_packet(stream, &auth_request(username, password)).await?;
        loop {
            let header = parse_reply_header(&read_frame(stream).await?)?;
            if header.xid != AUTH_XID {
                continue;
            }
            if header.err == 0 {
                break;
            }
            if i64::from(header.err) == CoordinationClassifier::AUTH_FAILED {
                state.send_replace(SessionState::AuthFailed);
                return Ok(Handshake::Rejected);
            }
            return Err(std::io::Error::other(format!(
                "authentication reply carried error code {}",
                header.err
            )));
        }
    }

    sink.emit(
        Severity::Normal,
        &format!(
            "session 0x{:x} established (protocol {}, timeout {}ms)",
            response.session_id, response.protocol_version, response.timeout_ms
        ),
    );
    state.send_replace(SessionState::HasSession);
    Ok(Handshake::Established)
}

async fn run_session(
    mut stream: TcpStream,
    session_timeout_ms: i32,
    digest: Option<DigestPair>,
    state: watch::Sender<SessionState>,
    shutdown: CancellationToken,
    sink: SharedSink,
) {
    let result = tokio::select! {
        _ = shutdown.cancelled() => return,
        result = handshake(&mut stream, session_timeout_ms, digest.as_ref(), &state, &sink) => result,
    };

    match result {
        Ok(Handshake::Established) => {}
        Ok(Handshake::Rejected) => return,
        Err(e) => {
            sink.emit(Severity::Normal, &format!("session handshake failed: {}", e));
            state.send_replace(SessionState::Disconnected);
            return;
        }
    }

    // Hold the session open until closed or dropped by the server
    let mut buf = [0u8; 512];
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Err(e) = write_packet(&mut stream, &close_request(1)).await {
                    tracing::debug!("Failed to send close-session request: {}", e);
                }
                let _ = stream.shutdown().await;
                state.send_replace(SessionState::Disconnected);
                return;
            }
            read = stream.read(&mut buf) => match read {
                Ok(0) | Err(_) => {
                    sink.emit(Severity::Normal, "server closed the session");
                    state.send_replace(SessionState::Disconnected);
                    return;
                }
                Ok(_) => {}
            }
        }
    }
}

#[async_trait]
impl CoordinationSession for ZooKeeperSession {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err()
        {
            task.abort();
        }
    }
}

impl Drop for ZooKeeperSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
