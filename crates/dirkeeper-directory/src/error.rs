//! Directory error types
//!
//! Error definitions with transient/permanent classification. Repositories
//! convert these into [`Outcome`](crate::operation::Outcome) values at their
//! boundary, so callers outside this workspace rarely see them directly.

use thiserror::Error;

/// Error that can occur while talking to a directory server.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // Connection errors (usually transient)
    /// Failed to open or bind a connection.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection or operation timed out.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    // Authentication errors (permanent)
    /// The bind credentials were rejected.
    #[error("authentication failed: invalid bind credentials")]
    AuthenticationFailed,

    // Configuration errors (permanent)
    /// Source configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// No source with this name has been configured.
    #[error("unknown directory source: {source_name}")]
    UnknownSource { source_name: String },

    // Entry errors
    /// The DN or identifier does not resolve to an entry.
    #[error("entry not found: {identifier}")]
    NotFound { identifier: String },

    /// An entry with this DN already exists.
    #[error("entry already exists: {identifier}")]
    AlreadyExists { identifier: String },

    /// The attribute value being added is already present.
    #[error("attribute '{attribute}' already holds the value on {dn}")]
    ValueExists { dn: String, attribute: String },

    /// The attribute value being removed is not present.
    #[error("attribute '{attribute}' does not hold the value on {dn}")]
    NoSuchValue { dn: String, attribute: String },

    /// A required field is missing or malformed.
    #[error("validation failed: {message}")]
    Validation { message: String },

    // Operation errors
    /// Any other protocol-level failure.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DirectoryError {
    /// Check if this error is transient and the operation could be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::ConnectionFailed { .. } | DirectoryError::ConnectionTimeout { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Check if this error means the target entry does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound { .. })
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DirectoryError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            DirectoryError::AuthenticationFailed => "AUTH_FAILED",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            DirectoryError::UnknownSource { .. } => "UNKNOWN_SOURCE",
            DirectoryError::NotFound { .. } => "NOT_FOUND",
            DirectoryError::AlreadyExists { .. } => "ALREADY_EXISTS",
            DirectoryError::ValueExists { .. } => "VALUE_EXISTS",
            DirectoryError::NoSuchValue { .. } => "NO_SUCH_VALUE",
            DirectoryError::Validation { .. } => "VALIDATION_FAILED",
            DirectoryError::OperationFailed { .. } => "OPERATION_FAILED",
            DirectoryError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error with source.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        DirectoryError::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        DirectoryError::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let transient_errors = vec![
            DirectoryError::connection_failed("test"),
            DirectoryError::ConnectionTimeout { timeout_secs: 5 },
        ];

        for err in transient_errors {
            assert!(
                err.is_transient(),
                "Expected {} to be transient",
                err.error_code()
            );
            assert!(!err.is_permanent());
        }
    }

    #[test]
    fn test_permanent_errors() {
        let permanent_errors = vec![
            DirectoryError::AuthenticationFailed,
            DirectoryError::invalid_configuration("bad"),
            DirectoryError::not_found("cn=x,o=org"),
            DirectoryError::validation("cn is required"),
            DirectoryError::UnknownSource {
                source_name: "north".to_string(),
            },
        ];

        for err in permanent_errors {
            assert!(
                err.is_permanent(),
                "Expected {} to be permanent",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_error_display() {
        let err = DirectoryError::not_found("cn=JEADUP,ou=users,o=org");
        assert_eq!(err.to_string(), "entry not found: cn=JEADUP,ou=users,o=org");

        let err = DirectoryError::UnknownSource {
            source_name: "south".to_string(),
        };
        assert_eq!(err.to_string(), "unknown directory source: south");
        assert_eq!(err.error_code(), "UNKNOWN_SOURCE");
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::Other, "refused");
        let err = DirectoryError::connection_failed_with_source("bind failed", source_err);

        if let DirectoryError::ConnectionFailed { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("Expected ConnectionFailed variant");
        }
        assert!(err.is_transient());
    }
}
