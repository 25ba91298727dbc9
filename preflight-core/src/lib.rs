//! Core library for preflight dependency verification.
//!
//! A service about to start serving traffic first proves that its external
//! dependencies are reachable and usable: a document store, a message broker,
//! a coordination ensemble and an object store. This crate turns structured
//! connection settings into concrete targets, performs bounded connection
//! attempts against them, retries transient failures under an explicit
//! policy, and produces one readiness report per dependency.
//!
//! # Security Guarantees
//! - Credentials live in zeroizing containers and never appear in `Debug`
//!   output, logs, reports or error messages
//! - Every probe attempt opens at most one connection and releases it on
//!   every exit path, including cancellation
//! - Vendor clients are feature-gated
//!
//! # Architecture
//! Data flows one way:
//! configuration → [`resolver`] → [`probe`] (driven by [`retry`]) →
//! [`report`] → caller. The [`checker`] module composes the pipeline for a
//! single dependency or a whole [`DependencySet`].
//!
//! # Example
//! ```rust,no_run
//! use preflight_core::{CancellationToken, DependencySet, TracingSink, check_all};
//! use std::sync::Arc;
//!
//! # async fn run() -> preflight_core::Result<()> {
//! let set = DependencySet::from_json_str(
//!     r#"{ "dependencies": [ { "name": "zk", "kind": "coordination", "addresses": ["zk1:2181"] } ] }"#,
//! )?;
//! let reports = check_all(&set, Arc::new(TracingSink), &CancellationToken::new()).await;
//! assert_eq!(reports.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod security;
pub mod sink;

// Re-export commonly used types
pub use checker::{all_ready, check_all, check_dependency, check_with_probe};
pub use config::{
    BackendKind, Backoff, ConnectionConfig, DependencySet, DependencySpec, RetryPolicy,
    TlsSettings,
};
pub use error::{ErrorClass, PreflightError, Result};
pub use probe::{FailureReason, Probe, ProbeOutcome, default_probe};
pub use report::ReadinessReport;
pub use resolver::{ResolvedTarget, resolve};
pub use retry::verify;
pub use sink::{ConsoleSink, DiagnosticSink, MemorySink, Severity, SharedSink, TracingSink};
pub use tokio_util::sync::CancellationToken;
