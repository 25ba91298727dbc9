//! Secure credential containers with automatic memory zeroing.
//!
//! # Security
//! - Secrets are stored in `Zeroizing<String>` containers
//! - Memory is cleared when credentials go out of scope
//! - Secrets never appear in `Debug` output or serialized configuration

use crate::error::{MASK, PreflightError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

/// A secret string (password, access key secret) that never prints itself.
///
/// Deserializes from a plain JSON string; serializes back as the mask token so
/// a round-tripped configuration can never leak the value.
///
/// ```rust
/// use preflight_core::security::Secret;
///
/// let secret = Secret::new("hunter2");
/// assert_eq!(format!("{:?}", secret), "Secret(****)");
/// assert_eq!(secret.expose(), "hunter2");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Returns the plaintext. Only backend drivers should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret({MASK})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(MASK)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Username and secret pair handed to backend drivers.
///
/// # Example
///
/// ```rust
/// use preflight_core::security::{Credentials, Secret};
///
/// let creds = Credentials::new("admin".to_string(), Secret::new("secret"));
/// assert_eq!(creds.username(), "admin");
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone)]
pub struct Credentials {
    username: Zeroizing<String>,
    secret: Secret,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(username: String, secret: Secret) -> Self {
        Self {
            username: Zeroizing::new(username),
            secret,
        }
    }

    /// Builds credentials from an optional configured pair.
    ///
    /// Empty strings count as absent. Exactly one side present is a
    /// configuration error.
    ///
    /// # Errors
    /// Returns `Configuration` when only one half of the pair is set.
    pub fn from_pair(
        username: Option<&str>,
        secret: Option<&Secret>,
    ) -> crate::Result<Option<Self>> {
        let username = username.filter(|u| !u.is_empty());
        let secret = secret.filter(|s| !s.is_empty());

        match (username, secret) {
            (Some(user), Some(secret)) => Ok(Some(Self::new(user.to_string(), secret.clone()))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(PreflightError::configuration(
                "username is set but the secret is missing",
            )),
            (None, Some(_)) => Err(PreflightError::configuration(
                "secret is set but the username is missing",
            )),
        }
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Gets the secret container.
    pub const fn secret(&self) -> &Secret {
        &self.secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username())
            .field("secret", &self.secret)
            .finish()
    }
}
