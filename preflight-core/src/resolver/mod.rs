//! Target resolution.
//!
//! Turns a [`ConnectionConfig`] into a [`ResolvedTarget`]: a kind-specific
//! endpoint, optional TLS context and credentials, and a redacted descriptor.
//! Resolution validates every field up front and never touches the network;
//! the only side effect is reading TLS material from disk.
//!
//! # Security
//! The redacted descriptor is the only representation of a target that may be
//! logged. The raw document-store URI is kept in a zeroizing buffer and masked
//! in `Debug` output.

mod address;
mod document;
mod tls;

pub use address::{split_host_port, validate_addresses};
pub use tls::{ClientIdentity, TlsContext, load_tls_context};

use crate::config::{
    BackendKind, BrokerConfig, ConnectionConfig, CoordinationConfig, DocumentStoreConfig,
    ObjectStoreConfig,
};
use crate::error::{MASK, PreflightError};
use crate::security::{ConnectionInfo, Credentials};
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

/// Kind-specific connection endpoint.
#[derive(Clone)]
pub enum Endpoint {
    /// Full connection URI plus the database the liveness check targets
    DocumentStore {
        uri: Zeroizing<String>,
        database: String,
    },
    /// Bootstrap broker list
    Broker {
        addresses: Vec<String>,
        client_id: Option<String>,
    },
    /// Ensemble member list
    Coordination {
        addresses: Vec<String>,
        session_timeout: Duration,
        chroot: Option<String>,
    },
    /// `host[:port]` plus scheme selection and the public URLs to check
    ObjectStore {
        host: String,
        secure: bool,
        api_url: Option<String>,
        sign_endpoint: Option<String>,
    },
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentStore { database, .. } => f
                .debug_struct("DocumentStore")
                .field("uri", &MASK)
                .field("database", database)
                .finish(),
            Self::Broker {
                addresses,
                client_id,
            } => f
                .debug_struct("Broker")
                .field("addresses", addresses)
                .field("client_id", client_id)
                .finish(),
            Self::Coordination {
                addresses,
                session_timeout,
                chroot,
            } => f
                .debug_struct("Coordination")
                .field("addresses", addresses)
                .field("session_timeout", session_timeout)
                .field("chroot", chroot)
                .finish(),
            Self::ObjectStore {
                host,
                secure,
                api_url,
                sign_endpoint,
            } => f
                .debug_struct("ObjectStore")
                .field("host", host)
                .field("secure", secure)
                .field("api_url", api_url)
                .field("sign_endpoint", sign_endpoint)
                .finish(),
        }
    }
}

/// Read-only view of a configuration, ready for a probe.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    kind: BackendKind,
    endpoint: Endpoint,
    tls: Option<TlsContext>,
    credentials: Option<Credentials>,
    redacted: String,
}

impl ResolvedTarget {
    /// Backend kind.
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Endpoint details.
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// TLS context, when TLS is enabled.
    pub const fn tls(&self) -> Option<&TlsContext> {
        self.tls.as_ref()
    }

    /// Credentials, when configured.
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Descriptor with credentials masked. Safe to log.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

impl std::fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted)
    }
}

/// Resolves a configuration into a probe target.
///
/// # Errors
/// Returns `Configuration` for missing or malformed fields and
/// `TlsConfiguration` when TLS material cannot be loaded.
///
/// # Example
/// ```rust
/// use preflight_core::config::{ConnectionConfig, DocumentStoreConfig};
/// use preflight_core::resolver::resolve;
///
/// let config = ConnectionConfig::from(
///     DocumentStoreConfig::new(vec!["db1:27017".into()], "app").with_credentials("rw", "s3cret"),
/// );
/// let target = resolve(&config).unwrap();
/// assert_eq!(
///     target.redacted(),
///     "mongodb://****@db1:27017/app?authSource=admin&maxPoolSize=100"
/// );
/// ```
pub fn resolve(config: &ConnectionConfig) -> crate::Result<ResolvedTarget> {
    if config.max_retry() == Some(0) {
        return Err(PreflightError::configuration("max_retry must be at least 1"));
    }

    let target = match config {
        ConnectionConfig::DocumentStore(c) => resolve_document_store(c),
        ConnectionConfig::Broker(c) => resolve_broker(c),
        ConnectionConfig::Coordination(c) => resolve_coordination(c),
        ConnectionConfig::ObjectStore(c) => resolve_object_store(c),
    }?;

    tracing::debug!("Resolved {} target {}", target.kind, target.redacted);
    Ok(target)
}

fn resolve_document_store(config: &DocumentStoreConfig) -> crate::Result<ResolvedTarget> {
    let hosts = validate_addresses(&config.addresses)?;

    if config.database.trim().is_empty() {
        return Err(PreflightError::configuration("database name cannot be empty"));
    }
    if config.max_pool_size == 0 {
        return Err(PreflightError::configuration(
            "max_pool_size must be greater than 0",
        ));
    }
    if let Some(min) = config.min_pool_size
        && min > config.max_pool_size
    {
        return Err(PreflightError::configuration(format!(
            "min_pool_size ({}) cannot exceed max_pool_size ({})",
            min, config.max_pool_size
        )));
    }

    let credentials = Credentials::from_pair(config.username.as_deref(), config.password.as_ref())?;
    let tls = load_tls_context(&config.tls)?;
    let (uri, info) = document::build_uri(config, hosts, credentials.as_ref(), tls.is_some());

    Ok(ResolvedTarget {
        kind: BackendKind::DocumentStore,
        endpoint: Endpoint::DocumentStore {
            uri,
            database: config.database.clone(),
        },
        tls,
        credentials,
        redacted: info.to_safe_string(),
    })
}

fn resolve_broker(config: &BrokerConfig) -> crate::Result<ResolvedTarget> {
    let addresses = validate_addresses(&config.addresses)?;
    let credentials = Credentials::from_pair(config.username.as_deref(), config.password.as_ref())?;
    let tls = load_tls_context(&config.tls)?;
    let client_id = config.client_id.clone().filter(|id| !id.is_empty());

    let mut params = Vec::new();
    if let Some(id) = &client_id {
        params.push(("clientId".to_string(), id.clone()));
    }
    if tls.is_some() {
        params.push(("tls".to_string(), "true".to_string()));
    }

    let info = ConnectionInfo::new("kafka", addresses.clone())
        .with_query_params(params)
        .with_credentials(credentials.is_some());

    Ok(ResolvedTarget {
        kind: BackendKind::Broker,
        endpoint: Endpoint::Broker {
            addresses,
            client_id,
        },
        tls,
        credentials,
        redacted: info.to_safe_string(),
    })
}

fn resolve_coordination(config: &CoordinationConfig) -> crate::Result<ResolvedTarget> {
    let addresses = validate_addresses(&config.addresses)?;

    if config.session_timeout.is_zero() {
        return Err(PreflightError::configuration(
            "session_timeout must be greater than 0",
        ));
    }

    let chroot = match config.chroot.as_deref().map(str::trim) {
        None | Some("") | Some("/") => None,
        Some(path) if path.starts_with('/') => Some(path.trim_end_matches('/').to_string()),
        Some(path) => {
            return Err(PreflightError::configuration(format!(
                "chroot '{}' must be an absolute path",
                path
            )));
        }
    };

    let credentials = Credentials::from_pair(config.username.as_deref(), config.password.as_ref())?;

    let mut info =
        ConnectionInfo::new("zk", addresses.clone()).with_credentials(credentials.is_some());
    if let Some(path) = &chroot {
        info = info.with_path(path.clone());
    }

    Ok(ResolvedTarget {
        kind: BackendKind::Coordination,
        endpoint: Endpoint::Coordination {
            addresses,
            session_timeout: config.session_timeout,
            chroot,
        },
        tls: None,
        credentials,
        redacted: info.to_safe_string(),
    })
}

fn resolve_object_store(config: &ObjectStoreConfig) -> crate::Result<ResolvedTarget> {
    let endpoint = config.endpoint.trim();
    let access_key = config.access_key_id.as_deref().filter(|k| !k.is_empty());
    let secret = config.secret_access_key.as_ref().filter(|s| !s.is_empty());

    let (Some(access_key), Some(secret)) = (access_key, secret) else {
        return Err(PreflightError::configuration(
            "missing configuration for endpoint, access_key_id, or secret_access_key",
        ));
    };
    if endpoint.is_empty() {
        return Err(PreflightError::configuration(
            "missing configuration for endpoint, access_key_id, or secret_access_key",
        ));
    }

    // Bare `host:port` endpoints are treated as plain HTTP
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    let url = Url::parse(&with_scheme).map_err(|e| {
        PreflightError::configuration(format!("failed to parse object store endpoint: {}", e))
    })?;
    let Some(host_name) = url.host_str() else {
        return Err(PreflightError::configuration(
            "object store endpoint has no host",
        ));
    };
    let host = match url.port() {
        Some(port) => format!("{}:{}", host_name, port),
        None => host_name.to_string(),
    };

    let tls = load_tls_context(&config.tls)?;
    let secure = url.scheme() == "https" || config.use_ssl || tls.is_some();
    let credentials = Some(Credentials::new(access_key.to_string(), secret.clone()));

    let info = ConnectionInfo::new(if secure { "https" } else { "http" }, vec![host.clone()])
        .with_credentials(true);

    Ok(ResolvedTarget {
        kind: BackendKind::ObjectStore,
        endpoint: Endpoint::ObjectStore {
            host,
            secure,
            api_url: config.api_url.clone().filter(|u| !u.is_empty()),
            sign_endpoint: config.sign_endpoint.clone().filter(|u| !u.is_empty()),
        },
        tls,
        credentials,
        redacted: info.to_safe_string(),
    })
}
