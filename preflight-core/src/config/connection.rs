//! Per-backend connection configuration.
//!
//! These structs are what callers deserialize from their own configuration
//! files. They are read-only to the rest of the crate: the resolver derives a
//! [`ResolvedTarget`](crate::resolver::ResolvedTarget) from them and never
//! writes back.

use super::duration_ms;
use crate::security::Secret;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default `authSource` for the document store.
pub const DEFAULT_AUTH_SOURCE: &str = "admin";
/// Default document-store pool ceiling.
pub const DEFAULT_MAX_POOL_SIZE: u32 = 100;
/// Default coordination-service session timeout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(1);

/// The supported dependency types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// MongoDB-compatible document store
    DocumentStore,
    /// Kafka-compatible message broker
    Broker,
    /// ZooKeeper-compatible coordination service
    Coordination,
    /// S3/MinIO-compatible object store
    ObjectStore,
}

impl BackendKind {
    /// Human-readable label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DocumentStore => "document-store",
            Self::Broker => "broker",
            Self::Coordination => "coordination",
            Self::ObjectStore => "object-store",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TLS settings shared by every backend kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Whether TLS is used at all
    pub enabled: bool,
    /// PEM bundle with the CA certificates to trust
    pub ca_file: Option<PathBuf>,
    /// Accept certificates that fail verification
    pub insecure_skip_verify: bool,
    /// Expected peer name when it differs from the dialed host
    pub server_name: Option<String>,
    /// Client certificate for mutual TLS
    pub client_cert: Option<PathBuf>,
    /// Client private key for mutual TLS
    pub client_key: Option<PathBuf>,
}

/// Read preference passed to the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadPreference {
    /// Primary only
    Primary,
    /// Primary, falling back to secondaries
    PrimaryPreferred,
    /// Secondaries only
    Secondary,
    /// Secondaries, falling back to the primary
    SecondaryPreferred,
    /// Lowest latency member
    Nearest,
}

impl ReadPreference {
    /// Connection-string spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryPreferred => "primaryPreferred",
            Self::Secondary => "secondary",
            Self::SecondaryPreferred => "secondaryPreferred",
            Self::Nearest => "nearest",
        }
    }
}

/// Document store (MongoDB) settings.
///
/// # Example
/// ```rust
/// use preflight_core::config::DocumentStoreConfig;
///
/// let config = DocumentStoreConfig::new(vec!["db1:27017".into()], "app")
///     .with_credentials("rw", "secret")
///     .with_max_retry(3);
/// assert_eq!(config.database, "app");
/// assert_eq!(config.max_retry, Some(3));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Ordered `host:port` list
    pub addresses: Vec<String>,
    /// Database the liveness check runs against
    pub database: String,
    /// Optional username
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password
    #[serde(default)]
    pub password: Option<Secret>,
    /// Authentication database
    #[serde(default = "default_auth_source")]
    pub auth_source: String,
    /// Pool ceiling
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    /// Pool floor
    #[serde(default)]
    pub min_pool_size: Option<u32>,
    /// Replica set name
    #[serde(default)]
    pub replica_set: Option<String>,
    /// Read preference
    #[serde(default)]
    pub read_preference: Option<ReadPreference>,
    /// Driver-level retryable writes
    #[serde(default)]
    pub retry_writes: Option<bool>,
    /// Driver-level retryable reads
    #[serde(default)]
    pub retry_reads: Option<bool>,
    /// TLS settings
    #[serde(default)]
    pub tls: TlsSettings,
    /// Maximum number of connection attempts
    #[serde(default)]
    pub max_retry: Option<u32>,
}

fn default_auth_source() -> String {
    DEFAULT_AUTH_SOURCE.to_string()
}

const fn default_max_pool_size() -> u32 {
    DEFAULT_MAX_POOL_SIZE
}

impl DocumentStoreConfig {
    /// Creates a config with defaults for everything but addresses and database.
    pub fn new(addresses: Vec<String>, database: impl Into<String>) -> Self {
        Self {
            addresses,
            database: database.into(),
            username: None,
            password: None,
            auth_source: default_auth_source(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            min_pool_size: None,
            replica_set: None,
            read_preference: None,
            retry_writes: None,
            retry_reads: None,
            tls: TlsSettings::default(),
            max_retry: None,
        }
    }

    /// Builder method to set the credential pair.
    pub fn with_credentials(mut self, username: impl Into<String>, password: &str) -> Self {
        self.username = Some(username.into());
        self.password = Some(Secret::new(password));
        self
    }

    /// Builder method to set TLS settings.
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// Builder method to set the attempt budget.
    pub const fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = Some(max_retry);
        self
    }
}

/// Message broker (Kafka) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Bootstrap `host:port` list
    pub addresses: Vec<String>,
    /// Optional SASL username
    #[serde(default)]
    pub username: Option<String>,
    /// Optional SASL password
    #[serde(default)]
    pub password: Option<Secret>,
    /// Client id announced to the brokers
    #[serde(default)]
    pub client_id: Option<String>,
    /// TLS settings
    #[serde(default)]
    pub tls: TlsSettings,
    /// Maximum number of connection attempts
    #[serde(default)]
    pub max_retry: Option<u32>,
}

/// Coordination service (ZooKeeper) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Ensemble `host:port` list
    pub addresses: Vec<String>,
    /// Optional digest username
    #[serde(default)]
    pub username: Option<String>,
    /// Optional digest password
    #[serde(default)]
    pub password: Option<Secret>,
    /// Requested session timeout
    #[serde(
        default = "default_session_timeout",
        rename = "session_timeout_ms",
        with = "duration_ms"
    )]
    pub session_timeout: Duration,
    /// Optional chroot path
    #[serde(default)]
    pub chroot: Option<String>,
    /// Maximum number of connection attempts
    #[serde(default)]
    pub max_retry: Option<u32>,
}

const fn default_session_timeout() -> Duration {
    DEFAULT_SESSION_TIMEOUT
}

impl CoordinationConfig {
    /// Creates a config for an ensemble with default session timeout.
    pub const fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            username: None,
            password: None,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            chroot: None,
            max_retry: None,
        }
    }
}

/// Object store (MinIO/S3) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Endpoint URL (`http://host:port` or bare `host:port`)
    pub endpoint: String,
    /// Access key id
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key
    #[serde(default)]
    pub secret_access_key: Option<Secret>,
    /// Force HTTPS even when the endpoint scheme says otherwise
    #[serde(default)]
    pub use_ssl: bool,
    /// Public URL handed to clients
    #[serde(default)]
    pub api_url: Option<String>,
    /// URL used when presigning requests
    #[serde(default)]
    pub sign_endpoint: Option<String>,
    /// TLS settings
    #[serde(default)]
    pub tls: TlsSettings,
    /// Maximum number of connection attempts
    #[serde(default)]
    pub max_retry: Option<u32>,
}

/// Structured settings for one dependency, tagged by backend kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// Document store settings
    DocumentStore(DocumentStoreConfig),
    /// Broker settings
    Broker(BrokerConfig),
    /// Coordination service settings
    Coordination(CoordinationConfig),
    /// Object store settings
    ObjectStore(ObjectStoreConfig),
}

impl ConnectionConfig {
    /// Backend kind of this configuration.
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::DocumentStore(_) => BackendKind::DocumentStore,
            Self::Broker(_) => BackendKind::Broker,
            Self::Coordination(_) => BackendKind::Coordination,
            Self::ObjectStore(_) => BackendKind::ObjectStore,
        }
    }

    /// Configured attempt budget, if any.
    pub const fn max_retry(&self) -> Option<u32> {
        match self {
            Self::DocumentStore(c) => c.max_retry,
            Self::Broker(c) => c.max_retry,
            Self::Coordination(c) => c.max_retry,
            Self::ObjectStore(c) => c.max_retry,
        }
    }
}

impl From<DocumentStoreConfig> for ConnectionConfig {
    fn from(config: DocumentStoreConfig) -> Self {
        Self::DocumentStore(config)
    }
}

impl From<BrokerConfig> for ConnectionConfig {
    fn from(config: BrokerConfig) -> Self {
        Self::Broker(config)
    }
}

impl From<CoordinationConfig> for ConnectionConfig {
    fn from(config: CoordinationConfig) -> Self {
        Self::Coordination(config)
    }
}

impl From<ObjectStoreConfig> for ConnectionConfig {
    fn from(config: ObjectStoreConfig) -> Self {
        Self::ObjectStore(config)
    }
}
