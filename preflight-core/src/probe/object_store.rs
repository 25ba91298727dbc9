//! Object store (MinIO/S3) probe.
//!
//! Builds a client for the resolved endpoint, runs an explicit health check
//! bounded by the attempt timeout, then asks whether the endpoint is offline.
//! On success, public URLs that point at a loopback address are reported to
//! the injected sink as warnings; they never change the outcome.

use super::{BackendError, BackendErrorKind, ObjectStoreClassifier, Probe, ProbeOutcome};
use crate::config::BackendKind;
use crate::error::{redact_credentials_in_text, redact_url};
use crate::resolver::{Endpoint, ResolvedTarget};
use crate::sink::{SharedSink, Severity};
use async_trait::async_trait;
use std::time::Duration;
use url::{Host, Url};

/// Builds object-store client handles.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Builds a client for the target without contacting it.
    async fn build(&self, target: &ResolvedTarget)
    -> Result<Box<dyn ObjectStoreHandle>, BackendError>;
}

/// A built object-store client.
#[async_trait]
pub trait ObjectStoreHandle: Send + Sync {
    /// Explicit health check bounded by `timeout`.
    async fn health_check(&self, timeout: Duration) -> Result<(), BackendError>;

    /// Whether the last health check found the endpoint offline.
    async fn is_offline(&self) -> bool;
}

/// Probe for the object store.
pub struct ObjectStoreProbe {
    client: Box<dyn ObjectStoreClient>,
    classifier: ObjectStoreClassifier,
    sink: SharedSink,
}

impl ObjectStoreProbe {
    /// Creates a probe over a client implementation.
    pub fn new(client: impl ObjectStoreClient + 'static, sink: SharedSink) -> Self {
        Self {
            client: Box::new(client),
            classifier: ObjectStoreClassifier,
            sink,
        }
    }

    /// Creates a probe over the compiled-in HTTP client.
    #[cfg(feature = "object-store")]
    pub fn with_default_client(sink: SharedSink) -> Self {
        Self::new(HttpObjectStoreClient, sink)
    }

    /// Creates a probe that reports missing client support.
    #[cfg(not(feature = "object-store"))]
    pub fn with_default_client(sink: SharedSink) -> Self {
        Self::new(UnavailableClient, sink)
    }

    fn warn_on_loopback(&self, target: &ResolvedTarget) {
        let Endpoint::ObjectStore {
            api_url,
            sign_endpoint,
            ..
        } = target.endpoint()
        else {
            return;
        };

        for (field, value) in [("api_url", api_url), ("sign_endpoint", sign_endpoint)] {
            let Some(value) = value else {
                continue;
            };
            match Url::parse(value) {
                Ok(url) if is_loopback(&url) => self.sink.emit(
                    Severity::Warning,
                    &format!(
                        "{} {} points at a loopback address and is unreachable from other hosts",
                        field,
                        redact_url(value)
                    ),
                ),
                Ok(_) => {}
                Err(e) => self.sink.emit(
                    Severity::Warning,
                    &format!(
                        "{} {} could not be parsed: {}",
                        field,
                        redact_credentials_in_text(value),
                        e
                    ),
                ),
            }
        }
    }
}

/// Whether a URL's host is `localhost` or a loopback address.
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

#[async_trait]
impl Probe for ObjectStoreProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn probe(&self, target: &ResolvedTarget, timeout: Duration) -> ProbeOutcome {
        if target.kind() != BackendKind::ObjectStore {
            return ProbeOutcome::wrong_target(self.kind(), target);
        }

        let handle = match self.client.build(target).await {
            Ok(handle) => handle,
            Err(e) => return ProbeOutcome::from_error(&self.classifier, &e),
        };

        if let Err(e) = handle.health_check(timeout).await {
            return ProbeOutcome::from_error(&self.classifier, &e);
        }

        if handle.is_offline().await {
            return ProbeOutcome::from_error(
                &self.classifier,
                &BackendError::new(
                    BackendErrorKind::Offline,
                    format!("object store {} is offline", target.redacted()),
                ),
            );
        }

        self.warn_on_loopback(target);
        ProbeOutcome::Success
    }
}

#[cfg(not(feature = "object-store"))]
struct UnavailableClient;

#[cfg(not(feature = "object-store"))]
#[async_trait]
impl ObjectStoreClient for UnavailableClient {
    async fn build(
        &self,
        _target: &ResolvedTarget,
    ) -> Result<Box<dyn ObjectStoreHandle>, BackendError> {
        Err(BackendError::new(
            BackendErrorKind::MalformedTarget,
            "object store support not compiled (enable the `object-store` feature)",
        ))
    }
}

#[cfg(feature = "object-store")]
pub use http::HttpObjectStoreClient;

#[cfg(feature = "object-store")]
mod http {
    use super::*;
    use crate::resolver::TlsContext;
    use reqwest::{Certificate, ClientBuilder, Identity, StatusCode};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Liveness endpoint exposed by MinIO-compatible servers.
    pub const HEALTH_PATH: &str = "/minio/health/live";

    /// Client checking the MinIO liveness endpoint over HTTP(S).
    #[derive(Debug, Clone, Copy, Default)]
    pub struct HttpObjectStoreClient;

    struct HttpHandle {
        client: reqwest::Client,
        health_url: Url,
        offline: AtomicBool,
    }

    fn malformed(message: impl Into<String>) -> BackendError {
        BackendError::new(BackendErrorKind::MalformedTarget, message)
    }

    fn join_pem_files(cert: &std::path::Path, key: &std::path::Path) -> Result<Vec<u8>, BackendError> {
        let mut pem = std::fs::read(cert)
            .map_err(|e| malformed(format!("failed to read {}: {}", cert.display(), e)))?;
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        let key_pem = zeroize::Zeroizing::new(
            std::fs::read(key)
                .map_err(|e| malformed(format!("failed to read {}: {}", key.display(), e)))?,
        );
        pem.extend_from_slice(&key_pem);
        Ok(pem)
    }

    fn apply_tls(mut builder: ClientBuilder, tls: &TlsContext) -> Result<ClientBuilder, BackendError> {
        for der in &tls.ca_certificates {
            let cert = Certificate::from_der(der)
                .map_err(|e| malformed(format!("failed to load CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        if tls.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(identity) = &tls.client_identity {
            let pem = zeroize::Zeroizing::new(join_pem_files(
                &identity.cert_path,
                &identity.key_path,
            )?);
            let identity = Identity::from_pem(&pem)
                .map_err(|e| malformed(format!("failed to parse client identity: {}", e)))?;
            builder = builder.identity(identity);
        }

        Ok(builder)
    }

    /// Splits `host[:port]` into a resolvable host and a port, falling back
    /// to the scheme's default port.
    pub(super) fn dial_address(host: &str, scheme: &str) -> Result<(String, u16), BackendError> {
        let url = Url::parse(&format!("{}://{}", scheme, host))
            .map_err(|e| malformed(format!("invalid object store endpoint: {}", e)))?;
        let name = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(malformed("object store endpoint has no host")),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| malformed(format!("no port known for {}", host)))?;
        Ok((name, port))
    }

    /// Maps transport errors onto backend error kinds.
    pub(super) fn map_error(error: &reqwest::Error) -> BackendError {
        let kind = if error.is_timeout() {
            BackendErrorKind::Timeout
        } else if error.is_connect() {
            BackendErrorKind::ConnectionRefused
        } else if error.is_builder() {
            BackendErrorKind::MalformedTarget
        } else if let Some(status) = error.status() {
            BackendErrorKind::Status(i64::from(status.as_u16()))
        } else {
            BackendErrorKind::Other
        };
        BackendError::new(kind, error.to_string())
    }

    #[async_trait]
    impl ObjectStoreClient for HttpObjectStoreClient {
        async fn build(
            &self,
            target: &ResolvedTarget,
        ) -> Result<Box<dyn ObjectStoreHandle>, BackendError> {
            let Endpoint::ObjectStore { host, secure, .. } = target.endpoint() else {
                return Err(malformed("not an object store target"));
            };

            let scheme = if *secure { "https" } else { "http" };
            let mut builder = ClientBuilder::new();
            let mut request_host = host.clone();

            if let Some(tls) = target.tls() {
                builder = apply_tls(builder, tls)?;

                // Dial the configured host but present the override name
                if let Some(server_name) = &tls.server_name {
                    let (dial_host, port) = dial_address(host, scheme)?;
                    let addrs: Vec<_> = tokio::net::lookup_host((dial_host.as_str(), port))
                        .await
                        .map_err(|e| BackendError::from_io(&format!("resolve {}", host), &e))?
                        .collect();
                    builder = builder.resolve_to_addrs(server_name, &addrs);
                    request_host = format!("{}:{}", server_name, port);
                }
            }

            let health_url = Url::parse(&format!("{}://{}{}", scheme, request_host, HEALTH_PATH))
                .map_err(|e| malformed(format!("invalid object store endpoint: {}", e)))?;
            let client = builder.build().map_err(|e| map_error(&e))?;

            Ok(Box::new(HttpHandle {
                client,
                health_url,
                offline: AtomicBool::new(false),
            }))
        }
    }

    #[async_trait]
    impl ObjectStoreHandle for HttpHandle {
        async fn health_check(&self, timeout: Duration) -> Result<(), BackendError> {
            let response = self
                .client
                .get(self.health_url.clone())
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| {
                    self.offline.store(true, Ordering::SeqCst);
                    map_error(&e)
                })?;

            let status = response.status();
            if status.is_success() {
                self.offline.store(false, Ordering::SeqCst);
                return Ok(());
            }

            self.offline.store(true, Ordering::SeqCst);
            if status == StatusCode::SERVICE_UNAVAILABLE {
                // Reported through is_offline
                return Ok(());
            }

            Err(BackendError::status(
                i64::from(status.as_u16()),
                format!("health check returned {}", status),
            ))
        }

        async fn is_offline(&self) -> bool {
            self.offline.load(Ordering::SeqCst)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, ObjectStoreConfig};
    use crate::security::Secret;
    use crate::sink::MemorySink;
    use std::sync::Arc;

    struct StaticHandle {
        offline: bool,
    }

    #[async_trait]
    impl ObjectStoreHandle for StaticHandle {
        async fn health_check(&self, _timeout: Duration) -> Result<(), BackendError> {
            Ok(())
        }

        async fn is_offline(&self) -> bool {
            self.offline
        }
    }

    struct StaticClient {
        offline: bool,
    }

    #[async_trait]
    impl ObjectStoreClient for StaticClient {
        async fn build(
            &self,
            _target: &ResolvedTarget,
        ) -> Result<Box<dyn ObjectStoreHandle>, BackendError> {
            Ok(Box::new(StaticHandle {
                offline: self.offline,
            }))
        }
    }

    fn target(api_url: Option<&str>, sign_endpoint: Option<&str>) -> ResolvedTarget {
        crate::resolver::resolve(&ConnectionConfig::from(ObjectStoreConfig {
            endpoint: "http://minio:9000".to_string(),
            access_key_id: Some("minio".to_string()),
            secret_access_key: Some(Secret::new("minio-secret")),
            api_url: api_url.map(str::to_string),
            sign_endpoint: sign_endpoint.map(str::to_string),
            ..Default::default()
        }))
        .unwrap()
    }

    #[test]
    fn test_is_loopback() {
        for url in [
            "http://127.0.0.1:10002",
            "http://127.8.0.1",
            "http://[::1]:9000",
            "http://LOCALHOST:9000",
        ] {
            assert!(is_loopback(&Url::parse(url).unwrap()), "{url}");
        }
        for url in ["http://10.0.0.1:9000", "https://minio.example.com"] {
            assert!(!is_loopback(&Url::parse(url).unwrap()), "{url}");
        }
    }

    #[tokio::test]
    async fn test_loopback_urls_warn_once_each() {
        let sink = Arc::new(MemorySink::new());
        let probe = ObjectStoreProbe::new(StaticClient { offline: false }, sink.clone());

        let outcome = probe
            .probe(
                &target(Some("http://127.0.0.1:10002/object/"), Some("http://localhost:9000")),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(outcome, ProbeOutcome::Success);
        let warnings = sink.messages(Severity::Warning);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("api_url"));
        assert!(warnings[1].starts_with("sign_endpoint"));
    }

    #[tokio::test]
    async fn test_unparseable_url_warns_without_failing() {
        let sink = Arc::new(MemorySink::new());
        let probe = ObjectStoreProbe::new(StaticClient { offline: false }, sink.clone());

        let outcome = probe
            .probe(&target(Some("not a url"), None), Duration::from_secs(1))
            .await;

        assert_eq!(outcome, ProbeOutcome::Success);
        assert_eq!(sink.messages(Severity::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_public_urls_do_not_warn() {
        let sink = Arc::new(MemorySink::new());
        let probe = ObjectStoreProbe::new(StaticClient { offline: false }, sink.clone());

        let outcome = probe
            .probe(
                &target(Some("https://files.example.com"), None),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(outcome, ProbeOutcome::Success);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_offline_is_retryable() {
        let probe = ObjectStoreProbe::new(StaticClient { offline: true }, Arc::new(MemorySink::new()));
        let outcome = probe
            .probe(&target(None, None), Duration::from_secs(1))
            .await;
        assert!(matches!(outcome, ProbeOutcome::RetryableFailure(_)));
    }
}
