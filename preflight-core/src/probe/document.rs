//! Document store (MongoDB) probe.
//!
//! Opens a client from the resolved URI with connect and server-selection
//! timeouts, runs `ping` against the configured database, and shuts the
//! client down.

use super::{BackendError, BackendErrorKind, DocumentStoreClassifier, Probe, ProbeOutcome};
use crate::config::BackendKind;
use crate::resolver::ResolvedTarget;
use async_trait::async_trait;
use std::time::Duration;

/// Opens document-store sessions.
#[async_trait]
pub trait DocumentStoreClient: Send + Sync {
    /// Opens one session against the target.
    async fn connect(
        &self,
        target: &ResolvedTarget,
        timeout: Duration,
    ) -> Result<Box<dyn DocumentSession>, BackendError>;
}

/// One open document-store session.
#[async_trait]
pub trait DocumentSession: Send {
    /// Minimal liveness round trip.
    async fn ping(&mut self) -> Result<(), BackendError>;

    /// Releases the session.
    async fn close(&mut self);
}

/// Probe for the document store.
pub struct DocumentStoreProbe {
    client: Box<dyn DocumentStoreClient>,
    classifier: DocumentStoreClassifier,
}

impl DocumentStoreProbe {
    /// Creates a probe over a client implementation.
    pub fn new(client: impl DocumentStoreClient + 'static) -> Self {
        Self {
            client: Box::new(client),
            classifier: DocumentStoreClassifier,
        }
    }

    /// Creates a probe over the compiled-in driver.
    #[cfg(feature = "mongodb")]
    pub fn with_default_client() -> Self {
        Self::new(MongoClient)
    }

    /// Creates a probe that reports missing driver support.
    #[cfg(not(feature = "mongodb"))]
    pub fn with_default_client() -> Self {
        Self::new(UnavailableClient)
    }
}

#[async_trait]
impl Probe for DocumentStoreProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::DocumentStore
    }

    async fn probe(&self, target: &ResolvedTarget, timeout: Duration) -> ProbeOutcome {
        if target.kind() != BackendKind::DocumentStore {
            return ProbeOutcome::wrong_target(self.kind(), target);
        }

        let mut session = match self.client.connect(target, timeout).await {
            Ok(session) => session,
            Err(e) => return ProbeOutcome::from_error(&self.classifier, &e),
        };

        let result = session.ping().await;
        session.close().await;

        match result {
            Ok(()) => ProbeOutcome::Success,
            Err(e) => ProbeOutcome::from_error(&self.classifier, &e),
        }
    }
}

/// Stand-in used when the driver feature is disabled.
#[cfg(not(feature = "mongodb"))]
struct UnavailableClient;

#[cfg(not(feature = "mongodb"))]
#[async_trait]
impl DocumentStoreClient for UnavailableClient {
    async fn connect(
        &self,
        _target: &ResolvedTarget,
        _timeout: Duration,
    ) -> Result<Box<dyn DocumentSession>, BackendError> {
        Err(BackendError::new(
            BackendErrorKind::MalformedTarget,
            "document store support not compiled (enable the `mongodb` feature)",
        ))
    }
}

#[cfg(feature = "mongodb")]
pub use driver::MongoClient;

#[cfg(feature = "mongodb")]
mod driver {
    use super::*;
    use crate::resolver::{Endpoint, TlsContext};
    use mongodb::bson::doc;
    use mongodb::error::ErrorKind;
    use mongodb::options::{ClientOptions, Tls, TlsOptions};

    /// Client backed by the `mongodb` driver.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct MongoClient;

    struct MongoSession {
        client: Option<mongodb::Client>,
        database: String,
    }

    /// Maps driver errors onto backend error kinds.
    pub(super) fn map_error(error: &mongodb::error::Error) -> BackendError {
        let message = error.to_string();
        let kind = match &*error.kind {
            ErrorKind::Authentication { .. } => BackendErrorKind::Authentication,
            ErrorKind::Command(command) => BackendErrorKind::Status(i64::from(command.code)),
            ErrorKind::InvalidArgument { .. } | ErrorKind::InvalidTlsConfig { .. } => {
                BackendErrorKind::MalformedTarget
            }
            ErrorKind::ServerSelection { .. } => BackendErrorKind::Timeout,
            ErrorKind::DnsResolve { .. } => BackendErrorKind::NameResolution,
            ErrorKind::Io(io) => BackendError::from_io("I/O", io).kind(),
            _ => BackendErrorKind::Other,
        };
        BackendError::new(kind, message)
    }

    fn tls_options(context: &TlsContext) -> Result<TlsOptions, BackendError> {
        let mut options = TlsOptions::default();
        options.ca_file_path = context.ca_file.clone();
        options.allow_invalid_certificates = Some(context.insecure_skip_verify);

        if let Some(identity) = &context.client_identity {
            // The driver reads certificate and key from one PEM file
            if identity.cert_path != identity.key_path {
                return Err(BackendError::new(
                    BackendErrorKind::MalformedTarget,
                    "document store client identity must be a combined certificate/key PEM file",
                ));
            }
            options.cert_key_file_path = Some(identity.cert_path.clone());
        }

        if let Some(name) = &context.server_name {
            tracing::warn!(
                "Document store driver does not support a TLS server name override; ignoring '{}'",
                name
            );
        }

        Ok(options)
    }

    #[async_trait]
    impl DocumentStoreClient for MongoClient {
        async fn connect(
            &self,
            target: &ResolvedTarget,
            timeout: Duration,
        ) -> Result<Box<dyn DocumentSession>, BackendError> {
            let Endpoint::DocumentStore { uri, database } = target.endpoint() else {
                return Err(BackendError::new(
                    BackendErrorKind::MalformedTarget,
                    "not a document store target",
                ));
            };

            let mut options = ClientOptions::parse(uri.as_str())
                .await
                .map_err(|e| map_error(&e))?;

            options.connect_timeout = Some(timeout);
            options.server_selection_timeout = Some(timeout);
            options.app_name = Some(format!("preflight-{}", env!("CARGO_PKG_VERSION")));

            if let Some(context) = target.tls() {
                options.tls = Some(Tls::Enabled(tls_options(context)?));
            }

            let client = mongodb::Client::with_options(options).map_err(|e| map_error(&e))?;

            tracing::debug!("Opened document store client for {}", target.redacted());

            Ok(Box::new(MongoSession {
                client: Some(client),
                database: database.clone(),
            }))
        }
    }

    #[async_trait]
    impl DocumentSession for MongoSession {
        async fn ping(&mut self) -> Result<(), BackendError> {
            let Some(client) = &self.client else {
                return Err(BackendError::new(
                    BackendErrorKind::TransportReset,
                    "session already closed",
                ));
            };

            client
                .database(&self.database)
                .run_command(doc! { "ping": 1 })
                .await
                .map(|_| ())
                .map_err(|e| map_error(&e))
        }

        async fn close(&mut self) {
            if let Some(client) = self.client.take() {
                client.shutdown().await;
            }
        }
    }

}
