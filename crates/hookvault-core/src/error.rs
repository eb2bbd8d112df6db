//! Error types for the hookvault service.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hookvault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller lacks the required privilege, or a self-report names a
    /// different identity than the verified caller. Always fatal to the
    /// call; no partial effects survive.
    #[error("Permission denied: {message}")]
    Permission { message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for hookvault operations.
pub type Result<T> = std::result::Result<T, Error>;

// Conversion implementations for common error types

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl Error {
    /// Create a permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Error::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for permission failures, which callers surface as an outright
    /// rejection rather than a generic call failure.
    pub fn is_permission(&self) -> bool {
        matches!(self, Error::Permission { .. })
    }
}
