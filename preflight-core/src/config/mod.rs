//! Configuration types.
//!
//! - `connection`: per-backend connection settings ([`ConnectionConfig`])
//! - `policy`: retry budget, backoff and deadline ([`RetryPolicy`])
//! - `file`: JSON dependency sets read by the binary ([`DependencySet`])
//!
//! # Security
//! Passwords are held in [`Secret`](crate::security::Secret) containers and
//! never appear in `Debug` output or re-serialized configuration.

mod connection;
mod duration_ms;
mod file;
mod policy;

pub use connection::{
    BackendKind, BrokerConfig, ConnectionConfig, CoordinationConfig, DEFAULT_AUTH_SOURCE,
    DEFAULT_MAX_POOL_SIZE, DEFAULT_SESSION_TIMEOUT, DocumentStoreConfig, ObjectStoreConfig,
    ReadPreference, TlsSettings,
};
pub use file::{DependencySet, DependencySpec};
pub use policy::{
    Backoff, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy,
};
