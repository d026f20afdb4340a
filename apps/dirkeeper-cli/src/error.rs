//! CLI error types and exit codes

use dirkeeper_directory::error::DirectoryError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed
/// - 3: Directory unreachable
/// - 4: Validation error or missing entry
/// - 5: Directory rejected the operation
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No sources file given. Pass --config or set DIRKEEPER_SOURCES.")]
    NoSourcesFile,

    #[error("Several sources are configured ({0}); pick one with --source.")]
    AmbiguousSource(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::AuthenticationFailed(_) => 2,
            CliError::ConnectionFailed(_) => 3,
            CliError::Validation(_) | CliError::NotFound(_) => 4,
            CliError::OperationFailed(_) => 5,
            CliError::Config(_)
            | CliError::NoSourcesFile
            | CliError::AmbiguousSource(_)
            | CliError::Output(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::ConnectionFailed(_) => {
                Some("Check the host, port and TLS settings of the source.")
            }
            CliError::AuthenticationFailed(_) => Some("Check the bind DN and password."),
            CliError::NoSourcesFile => Some("export DIRKEEPER_SOURCES=/etc/dirkeeper/sources.json"),
            _ => None,
        }
    }
}

impl From<DirectoryError> for CliError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::ConnectionFailed { .. } | DirectoryError::ConnectionTimeout { .. } => {
                CliError::ConnectionFailed(e.to_string())
            }
            DirectoryError::AuthenticationFailed => CliError::AuthenticationFailed(e.to_string()),
            DirectoryError::InvalidConfiguration { .. } | DirectoryError::UnknownSource { .. } => {
                CliError::Config(e.to_string())
            }
            DirectoryError::Validation { .. } => CliError::Validation(e.to_string()),
            DirectoryError::NotFound { .. } => CliError::NotFound(e.to_string()),
            _ => CliError::OperationFailed(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(format!("JSON error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_errors_map_to_exit_codes() {
        let cases = [
            (DirectoryError::connection_failed("down"), 3),
            (DirectoryError::validation("bad"), 4),
            (DirectoryError::not_found("cn=x"), 4),
            (DirectoryError::invalid_configuration("no host"), 1),
            (DirectoryError::operation_failed("rejected"), 5),
        ];
        for (error, code) in cases {
            assert_eq!(CliError::from(error).exit_code(), code);
        }
    }
}
