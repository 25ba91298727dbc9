//! Security utilities for credential protection.
//!
//! # Module Structure
//! - `credentials`: zeroizing secret and credential containers
//! - `connection`: credential-free connection descriptors for diagnostics

mod connection;
mod credentials;

pub use connection::ConnectionInfo;
pub use credentials::{Credentials, Secret};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_descriptor_never_contains_secret() {
        let creds = Credentials::new("user".to_string(), Secret::new("password123"));
        let info = ConnectionInfo::new("kafka", vec!["broker:9092".to_string()])
            .with_credentials(true);

        let safe = info.to_safe_string();
        assert!(!safe.contains(creds.secret().expose()));
        assert!(!safe.contains(creds.username()));
    }
}
