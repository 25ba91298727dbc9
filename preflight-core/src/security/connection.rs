//! Credential-free connection descriptors.
//!
//! A [`ConnectionInfo`] holds everything needed to describe a target in logs
//! and reports, with the credential segment reduced to a mask. It is built
//! from the same parts as the real endpoint so both stay in sync.

use crate::error::MASK;

/// Connection information with credentials removed.
///
/// This struct can be safely logged, displayed, or serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Protocol scheme (e.g., "mongodb", "kafka", "zk", "https")
    pub scheme: String,
    /// Ordered `host:port` list
    pub hosts: Vec<String>,
    /// Optional path segment (database, chroot)
    pub path: Option<String>,
    /// Query parameters in their final order
    pub query_params: Vec<(String, String)>,
    /// Whether the real endpoint carries credentials
    pub has_credentials: bool,
}

impl ConnectionInfo {
    /// Creates a descriptor for a scheme and host list.
    pub fn new(scheme: impl Into<String>, hosts: Vec<String>) -> Self {
        Self {
            scheme: scheme.into(),
            hosts,
            path: None,
            query_params: Vec::new(),
            has_credentials: false,
        }
    }

    /// Builder method to set the path segment.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Builder method to set query parameters.
    pub fn with_query_params(mut self, params: Vec<(String, String)>) -> Self {
        self.query_params = params;
        self
    }

    /// Builder method to mark that credentials are configured.
    pub const fn with_credentials(mut self, present: bool) -> Self {
        self.has_credentials = present;
        self
    }

    /// Renders the descriptor with the credential segment masked.
    ///
    /// # Example
    /// ```rust
    /// use preflight_core::security::ConnectionInfo;
    ///
    /// let info = ConnectionInfo::new("mongodb", vec!["db1:27017".into(), "db2:27017".into()])
    ///     .with_path("app")
    ///     .with_credentials(true);
    /// assert_eq!(info.to_safe_string(), "mongodb://****@db1:27017,db2:27017/app");
    /// ```
    pub fn to_safe_string(&self) -> String {
        let mut url = format!("{}://", self.scheme);

        if self.has_credentials {
            url.push_str(MASK);
            url.push('@');
        }

        url.push_str(&self.hosts.join(","));

        if let Some(path) = &self.path {
            url.push('/');
            url.push_str(path.trim_start_matches('/'));
        }

        if !self.query_params.is_empty() {
            url.push('?');
            let params: Vec<String> = self
                .query_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            url.push_str(&params.join("&"));
        }

        url
    }
}

impl std::fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_safe_string())
    }
}
