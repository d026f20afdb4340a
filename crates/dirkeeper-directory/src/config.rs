//! Connection configuration types
//!
//! Settings shared by every directory backend: timeouts, pool sizing and TLS.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DirectoryError, DirectoryResult};

/// Connection and pool settings for one directory source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Per-operation receive timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Maximum age of a pooled connection before it is discarded.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

fn default_pool_size() -> usize {
    5
}

fn default_max_lifetime() -> u64 {
    300
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            read_timeout_secs: default_read_timeout(),
            pool_size: default_pool_size(),
            max_lifetime_secs: default_max_lifetime(),
        }
    }
}

impl ConnectionSettings {
    /// Create new connection settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    /// Set the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn with_max_lifetime(mut self, secs: u64) -> Self {
        self.max_lifetime_secs = secs;
        self
    }

    /// Get connection timeout as Duration.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get read timeout as Duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Get maximum connection lifetime as Duration.
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Validate the settings.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.pool_size == 0 {
            return Err(DirectoryError::invalid_configuration(
                "pool_size must be at least 1",
            ));
        }
        if self.max_lifetime_secs == 0 {
            return Err(DirectoryError::invalid_configuration(
                "max_lifetime_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

/// SSL/TLS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verify_certificate: true,
        }
    }
}

impl TlsConfig {
    /// Log a warning when certificate verification is disabled.
    pub fn validate_security(&self) {
        if !self.verify_certificate {
            tracing::warn!(
                target: "security",
                "TLS certificate verification is DISABLED for this directory source; \
                 only use this against a local test server"
            );
        }
    }
}
