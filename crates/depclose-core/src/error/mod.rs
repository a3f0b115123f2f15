//! Error types and result aliases for depclose operations.
//!
//! Provides a unified error type that covers all fatal conditions across
//! configuration loading, metadata queries and closure resolution. An
//! unsatisfied requirement is not an error and has no variant here.

use thiserror::Error;

/// Unified error type for all depclose operations
#[derive(Error, Debug)]
pub enum DepcloseError {
    // Config errors
    #[error("Failed to parse depclose.toml: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Metadata errors
    #[error("Repository '{location}' has no package index")]
    RepositoryNotFound { location: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Malformed metadata from '{location}': {message}")]
    MalformedMetadata { location: String, message: String },

    // Resolution errors
    #[error("No source package '{source_name}' found for binary package '{binary}'")]
    MissingSourcePackage { binary: String, source_name: String },

    #[error("Closure did not converge within {limit} passes ({working_set} packages in working set, {resolved} sources resolved)")]
    PassLimitExceeded {
        limit: usize,
        working_set: usize,
        resolved: usize,
    },

    // Output errors
    #[error("Failed to serialize {what}: {message}")]
    Serialization { what: String, message: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for depclose operations
pub type DepcloseResult<T> = Result<T, DepcloseError>;

impl DepcloseError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create a config validation error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DepcloseError::Network { .. } | DepcloseError::Io { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DepcloseError::RepositoryNotFound { .. } => {
                Some("Check the repository URL and the --release value")
            }
            DepcloseError::Network { .. } => Some("Check your network connection and try again"),
            DepcloseError::MalformedMetadata { .. } => {
                Some("The repository index must be a JSON document with a 'packages' array")
            }
            DepcloseError::MissingSourcePackage { .. } => {
                Some("Make sure the SRPM repositories for this release are configured and complete")
            }
            DepcloseError::PassLimitExceeded { .. } => {
                Some("Raise [resolution] max_passes or remove it to run until convergence")
            }
            DepcloseError::TomlParse { .. } | DepcloseError::ConfigValidation { .. } => {
                Some("Run 'depclose config' to inspect the effective configuration")
            }
            _ => None,
        }
    }
}
