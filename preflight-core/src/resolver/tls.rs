//! TLS material loading.

use crate::config::TlsSettings;
use crate::error::PreflightError;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Paths to a client certificate chain and its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

/// Validated TLS parameters for one target.
///
/// `ca_certificates` holds the DER bytes of every certificate found in the
/// configured bundle; it is empty when the platform roots should be used.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsContext {
    /// Bundle path, kept for drivers that want a path rather than bytes
    pub ca_file: Option<PathBuf>,
    /// DER-encoded CA certificates
    pub ca_certificates: Vec<Vec<u8>>,
    /// Accept certificates that fail verification
    pub insecure_skip_verify: bool,
    /// Expected peer name override
    pub server_name: Option<String>,
    /// Client identity for mutual TLS
    pub client_identity: Option<ClientIdentity>,
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("ca_file", &self.ca_file)
            .field("ca_certificates", &self.ca_certificates.len())
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("server_name", &self.server_name)
            .field("client_identity", &self.client_identity)
            .finish()
    }
}

/// Builds the TLS context for a target, or `None` when TLS is disabled.
///
/// # Errors
/// Returns `TlsConfiguration` when the CA bundle cannot be read or holds no
/// parseable certificate, when only half of the client identity is set, or
/// when the client certificate or key cannot be parsed.
pub fn load_tls_context(settings: &TlsSettings) -> crate::Result<Option<TlsContext>> {
    if !settings.enabled {
        return Ok(None);
    }

    let ca_certificates = match &settings.ca_file {
        Some(path) => read_certificates(path)?,
        None => Vec::new(),
    };

    let client_identity = match (&settings.client_cert, &settings.client_key) {
        (Some(cert_path), Some(key_path)) => {
            read_certificates(cert_path)?;
            check_private_key(key_path)?;
            Some(ClientIdentity {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            })
        }
        (None, None) => None,
        _ => {
            return Err(PreflightError::tls(
                "client_cert and client_key must be configured together",
            ));
        }
    };

    tracing::debug!(
        "Loaded TLS context with {} CA certificate(s)",
        ca_certificates.len()
    );

    Ok(Some(TlsContext {
        ca_file: settings.ca_file.clone(),
        ca_certificates,
        insecure_skip_verify: settings.insecure_skip_verify,
        server_name: settings.server_name.clone(),
        client_identity,
    }))
}

fn read_pem(path: &Path) -> crate::Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        PreflightError::tls_io(format!("Failed to read {}", path.display()), e)
    })
}

fn read_certificates(path: &Path) -> crate::Result<Vec<Vec<u8>>> {
    let pem = read_pem(path)?;
    let mut reader = BufReader::new(pem.as_slice());

    let certificates = rustls_pemfile::certs(&mut reader)
        .map(|cert| cert.map(|der| der.to_vec()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| {
            PreflightError::tls_io(
                format!("Failed parsing PEM file {}", path.display()),
                e,
            )
        })?;

    if certificates.is_empty() {
        return Err(PreflightError::tls(format!(
            "Failed parsing PEM file {}: no certificate found",
            path.display()
        )));
    }

    Ok(certificates)
}

fn check_private_key(path: &Path) -> crate::Result<()> {
    let pem = read_pem(path)?;
    let mut reader = BufReader::new(pem.as_slice());

    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(PreflightError::tls(format!(
            "No private key found in {}",
            path.display()
        ))),
        Err(e) => Err(PreflightError::tls_io(
            format!("Failed parsing private key {}", path.display()),
            e,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // PEM framing only; the loader does not validate the DER contents.
    const TEST_CERT: &str = "-----BEGIN CERTIFICATE-----
MIIBszCCAVmgAwIBAgIUQ2hl1S0mfE3HvYbMLh1ZD8lQ1N8wCgYIKoZIzj0EAwIw
FjEUMBIGA1UEAwwLcHJlZmxpZ2h0LWNhMB4XDTI0MDEwMTAwMDAwMFoXDTM0MDEw
MTAwMDAwMFowFjEUMBIGA1UEAwwLcHJlZmxpZ2h0LWNhMFkwEwYHKoZIzj0CAQYI
KoZIzj0DAQcDQgAEq3Yb3Xw5X3h2lV1m0nq0H3pUuJ8y6bq4j3p1V7m0m1c3q5x5
Xo9Q1C2k3Q6G4o8pY7a9G1d2yXb8a7p3c3e9jqNTMFEwHQYDVR0OBBYEFJ0xq2Vn
b6o3m2r3mB3o8Y1h2v8rMB8GA1UdIwQYMBaAFJ0xq2Vnb6o3m2r3mB3o8Y1h2v8r
MA8GA1UdEwEB/wQFMAMBAf8wCgYIKoZIzj0EAwIDSAAwRQIgCkq2k6kZc9cX7H2m
F3Zk4p3f8Xc9Y2y3aR9l0m1v8tUCIQDc2vZ3yD1h0v3x2m9n8o7p6q5r4s3t2u1v
0w9x8y7z6A==
-----END CERTIFICATE-----
";

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_tls_disabled_yields_none() {
        let settings = TlsSettings {
            enabled: false,
            ca_file: Some(PathBuf::from("/does/not/matter.pem")),
            ..Default::default()
        };
        assert!(load_tls_context(&settings).unwrap().is_none());
    }

    #[test]
    fn test_tls_enabled_without_bundle_uses_platform_roots() {
        let settings = TlsSettings {
            enabled: true,
            insecure_skip_verify: true,
            ..Default::default()
        };
        let context = load_tls_context(&settings).unwrap().unwrap();
        assert!(context.ca_certificates.is_empty());
        assert!(context.insecure_skip_verify);
    }

    #[test]
    fn test_missing_bundle_is_tls_error() {
        let settings = TlsSettings {
            enabled: true,
            ca_file: Some(PathBuf::from("/nonexistent/global-bundle.pem")),
            ..Default::default()
        };
        let err = load_tls_context(&settings).unwrap_err();
        assert!(matches!(err, PreflightError::TlsConfiguration { .. }));
    }

    #[test]
    fn test_bundle_without_certificates_is_tls_error() {
        let file = write_temp("this is not a pem bundle\n");
        let settings = TlsSettings {
            enabled: true,
            ca_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = load_tls_context(&settings).unwrap_err();
        assert!(matches!(err, PreflightError::TlsConfiguration { .. }));
        assert!(err.to_string().contains("no certificate"));
    }

    #[test]
    fn test_bundle_with_certificate_loads() {
        let file = write_temp(TEST_CERT);
        let settings = TlsSettings {
            enabled: true,
            ca_file: Some(file.path().to_path_buf()),
            server_name: Some("db.internal".to_string()),
            ..Default::default()
        };
        let context = load_tls_context(&settings).unwrap().unwrap();
        assert_eq!(context.ca_certificates.len(), 1);
        assert_eq!(context.server_name.as_deref(), Some("db.internal"));
    }

    #[test]
    fn test_half_client_identity_rejected() {
        let file = write_temp(TEST_CERT);
        let settings = TlsSettings {
            enabled: true,
            client_cert: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(load_tls_context(&settings).is_err());
    }
}
