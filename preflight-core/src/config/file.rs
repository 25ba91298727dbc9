//! Dependency set files.
//!
//! A dependency set is the JSON document the `preflight` binary reads: a
//! shared retry policy plus a list of named dependencies, each of which may
//! override the policy.
//!
//! ```json
//! {
//!   "policy": { "max_attempts": 5, "backoff": { "type": "fixed", "delay_ms": 500 } },
//!   "dependencies": [
//!     { "name": "mongo", "kind": "document_store", "addresses": ["db1:27017"], "database": "app" },
//!     { "name": "zk", "kind": "coordination", "addresses": ["zk1:2181"] }
//!   ]
//! }
//! ```

use super::{ConnectionConfig, RetryPolicy};
use crate::error::PreflightError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One named dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Name used in reports
    pub name: String,
    /// Per-dependency policy override
    #[serde(default)]
    pub policy: Option<RetryPolicy>,
    /// Backend settings
    #[serde(flatten)]
    pub connection: ConnectionConfig,
}

impl DependencySpec {
    /// Creates a named dependency without a policy override.
    pub fn new(name: impl Into<String>, connection: impl Into<ConnectionConfig>) -> Self {
        Self {
            name: name.into(),
            policy: None,
            connection: connection.into(),
        }
    }

    /// Effective policy: the override or the shared one, then the config's
    /// `max_retry`.
    pub fn effective_policy(&self, shared: &RetryPolicy) -> RetryPolicy {
        self.policy
            .unwrap_or(*shared)
            .with_max_retry_override(self.connection.max_retry())
    }
}

/// A shared policy plus the dependencies to verify.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencySet {
    /// Policy applied to every dependency without an override
    #[serde(default)]
    pub policy: RetryPolicy,
    /// Dependencies to verify
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

impl DependencySet {
    /// Parses and validates a dependency set from JSON text.
    ///
    /// # Errors
    /// Returns `Serialization` for malformed JSON and `Configuration` when
    /// validation fails.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let set: Self = serde_json::from_str(json).map_err(|e| PreflightError::Serialization {
            context: "Failed to parse dependency set".to_string(),
            source: e,
        })?;
        set.validate()?;
        Ok(set)
    }

    /// Reads and validates a dependency set file.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read, otherwise as
    /// [`DependencySet::from_json_str`].
    pub async fn from_json_file(path: &Path) -> crate::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PreflightError::Io {
                context: format!("Failed to read {}", path.display()),
                source: e,
            })?;
        Self::from_json_str(&json)
    }

    /// Validates names and policies.
    ///
    /// # Errors
    /// Returns `Configuration` for empty or duplicate names and invalid
    /// policies.
    pub fn validate(&self) -> crate::Result<()> {
        self.policy.validate()?;

        let mut seen = HashSet::new();
        for dependency in &self.dependencies {
            if dependency.name.trim().is_empty() {
                return Err(PreflightError::configuration(
                    "dependency name cannot be empty",
                ));
            }
            if !seen.insert(dependency.name.as_str()) {
                return Err(PreflightError::configuration(format!(
                    "duplicate dependency name '{}'",
                    dependency.name
                )));
            }
            if let Some(policy) = &dependency.policy {
                policy.validate().map_err(|e| {
                    PreflightError::configuration(format!("dependency '{}': {}", dependency.name, e))
                })?;
            }
        }

        Ok(())
    }
}
