//! Message broker (Kafka) probe.
//!
//! With the `kafka` feature the probe builds an `rdkafka` client from the
//! bootstrap list plus optional SASL credentials and fetches cluster metadata.
//! Without it, reaching any bootstrap broker over TCP counts as live. No
//! messages are produced or consumed either way.

use super::{BackendError, BackendErrorKind, BrokerClassifier, Probe, ProbeOutcome};
use crate::config::BackendKind;
use crate::resolver::{Endpoint, ResolvedTarget};
use crate::sink::{Severity, SharedSink};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Opens broker client handles.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Builds a client and confirms it reaches a bootstrap broker.
    async fn open(
        &self,
        target: &ResolvedTarget,
        timeout: Duration,
    ) -> Result<Box<dyn BrokerHandle>, BackendError>;
}

/// An open broker client.
#[async_trait]
pub trait BrokerHandle: Send {
    /// Releases the client.
    async fn close(&mut self);
}

/// Probe for the message broker.
pub struct BrokerProbe {
    client: Box<dyn BrokerClient>,
    classifier: BrokerClassifier,
}

impl BrokerProbe {
    /// Creates a probe over a client implementation.
    pub fn new(client: impl BrokerClient + 'static) -> Self {
        Self {
            client: Box::new(client),
            classifier: BrokerClassifier,
        }
    }

    /// Creates a probe over the compiled-in client.
    #[cfg(feature = "kafka")]
    pub fn with_default_client(_sink: SharedSink) -> Self {
        Self::new(KafkaClient)
    }

    /// Creates a probe over the TCP bootstrap check, reporting to `sink`.
    #[cfg(not(feature = "kafka"))]
    pub fn with_default_client(sink: SharedSink) -> Self {
        Self::new(TcpBootstrapClient::new(sink))
    }
}

#[async_trait]
impl Probe for BrokerProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::Broker
    }

    async fn probe(&self, target: &ResolvedTarget, timeout: Duration) -> ProbeOutcome {
        if target.kind() != BackendKind::Broker {
            return ProbeOutcome::wrong_target(self.kind(), target);
        }

        match self.client.open(target, timeout).await {
            Ok(mut handle) => {
                handle.close().await;
                ProbeOutcome::Success
            }
            Err(e) => ProbeOutcome::from_error(&self.classifier, &e),
        }
    }
}

fn broker_addresses(target: &ResolvedTarget) -> Result<&[String], BackendError> {
    match target.endpoint() {
        Endpoint::Broker { addresses, .. } => Ok(addresses),
        _ => Err(BackendError::new(
            BackendErrorKind::MalformedTarget,
            "not a broker target",
        )),
    }
}

/// Connects to the first reachable bootstrap address.
///
/// SASL credentials are not exercised; a reachable broker with configured
/// credentials is reported to the sink as a warning.
pub struct TcpBootstrapClient {
    sink: SharedSink,
}

impl TcpBootstrapClient {
    /// Creates a client reporting to `sink`.
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }

    fn warn_unverified_credentials(&self, target: &ResolvedTarget) {
        if target.credentials().is_some() {
            self.sink.emit(
                Severity::Warning,
                &format!(
                    "{} has SASL credentials configured but only TCP reachability was \
                     checked (built without the `kafka` feature)",
                    target.redacted()
                ),
            );
        }
    }
}

struct TcpHandle {
    stream: Option<TcpStream>,
}

#[async_trait]
impl BrokerClient for TcpBootstrapClient {
    async fn open(
        &self,
        target: &ResolvedTarget,
        timeout: Duration,
    ) -> Result<Box<dyn BrokerHandle>, BackendError> {
        let addresses = broker_addresses(target)?;
        let started = tokio::time::Instant::now();
        let mut last_error = None;

        for address in addresses {
            let left = timeout.saturating_sub(started.elapsed());
            match tokio::time::timeout(left, TcpStream::connect(address.as_str())).await {
                Ok(Ok(stream)) => {
                    tracing::debug!("Reached bootstrap broker {}", address);
                    self.warn_unverified_credentials(target);
                    return Ok(Box::new(TcpHandle {
                        stream: Some(stream),
                    }));
                }
                Ok(Err(e)) => {
                    tracing::debug!("Bootstrap broker {} unreachable: {}", address, e);
                    last_error = Some(BackendError::from_io(
                        &format!("connect to {}", address),
                        &e,
                    ));
                }
                Err(_) => {
                    return Err(BackendError::timeout(format!(
                        "no bootstrap broker reachable within {}ms",
                        timeout.as_millis()
                    )));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::new(BackendErrorKind::MalformedTarget, "no bootstrap brokers")
        }))
    }
}

#[async_trait]
impl BrokerHandle for TcpHandle {
    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

#[cfg(feature = "kafka")]
pub use driver::KafkaClient;

#[cfg(feature = "kafka")]
mod driver {
    use super::*;
    use rdkafka::config::ClientConfig;
    use rdkafka::consumer::{BaseConsumer, Consumer};
    use rdkafka::error::{KafkaError, RDKafkaErrorCode};

    /// Client backed by `rdkafka` metadata fetches.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct KafkaClient;

    struct KafkaHandle {
        consumer: Option<BaseConsumer>,
    }

    /// Maps client errors onto backend error kinds.
    pub(super) fn map_error(error: &KafkaError) -> BackendError {
        let kind = match error {
            KafkaError::ClientCreation(_) | KafkaError::ClientConfig(..) => {
                BackendErrorKind::MalformedTarget
            }
            _ => match error.rdkafka_error_code() {
                Some(RDKafkaErrorCode::OperationTimedOut) => BackendErrorKind::Timeout,
                Some(RDKafkaErrorCode::BrokerTransportFailure | RDKafkaErrorCode::AllBrokersDown) => {
                    BackendErrorKind::ConnectionRefused
                }
                Some(RDKafkaErrorCode::Resolve) => BackendErrorKind::NameResolution,
                Some(code) => BackendErrorKind::Status(i64::from(code as i32)),
                None => BackendErrorKind::Other,
            },
        };
        BackendError::new(kind, error.to_string())
    }

    fn client_config(target: &ResolvedTarget, addresses: &[String]) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", addresses.join(","));

        if let Endpoint::Broker {
            client_id: Some(id),
            ..
        } = target.endpoint()
        {
            config.set("client.id", id.as_str());
        }

        let protocol = match (target.credentials().is_some(), target.tls().is_some()) {
            (true, true) => "SASL_SSL",
            (true, false) => "SASL_PLAINTEXT",
            (false, true) => "SSL",
            (false, false) => "PLAINTEXT",
        };
        config.set("security.protocol", protocol);

        if let Some(credentials) = target.credentials() {
            config
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", credentials.username())
                .set("sasl.password", credentials.secret().expose());
        }

        if let Some(tls) = target.tls() {
            if let Some(ca) = &tls.ca_file {
                config.set("ssl.ca.location", ca.display().to_string());
            }
            if tls.insecure_skip_verify {
                config
                    .set("enable.ssl.certificate.verification", "false")
                    .set("ssl.endpoint.identification.algorithm", "none");
            }
            if let Some(identity) = &tls.client_identity {
                config
                    .set("ssl.certificate.location", identity.cert_path.display().to_string())
                    .set("ssl.key.location", identity.key_path.display().to_string());
            }
        }

        config
    }

    #[async_trait]
    impl BrokerClient for KafkaClient {
        async fn open(
            &self,
            target: &ResolvedTarget,
            timeout: Duration,
        ) -> Result<Box<dyn BrokerHandle>, BackendError> {
            let addresses = broker_addresses(target)?;
            let consumer: BaseConsumer = client_config(target, addresses)
                .create()
                .map_err(|e| map_error(&e))?;

            let fetched = tokio::task::spawn_blocking(move || {
                consumer
                    .fetch_metadata(None, timeout)
                    .map(|metadata| (consumer, metadata.brokers().len()))
            })
            .await
            .map_err(|e| BackendError::new(BackendErrorKind::Other, e.to_string()))?;

            let (consumer, brokers) = fetched.map_err(|e| map_error(&e))?;
            tracing::debug!(
                "Fetched metadata from {} ({} broker(s))",
                target.redacted(),
                brokers
            );

            Ok(Box::new(KafkaHandle {
                consumer: Some(consumer),
            }))
        }
    }

    #[async_trait]
    impl BrokerHandle for KafkaHandle {
        async fn close(&mut self) {
            // librdkafka tears its threads down on drop
            self.consumer.take();
        }
    }

}
