//! Common error types for GraphXfer.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for GraphXfer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local source file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The directory provider or the API rejected the credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Principal or remote object does not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or HTTP-level failure of a remote call.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Process exit code for this kind of failure.
    ///
    /// Zero is reserved for success; every variant maps to a distinct
    /// non-zero code so callers can tell which stage failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_) | Error::Serialization(_) => 2,
            Error::FileNotFound(_) => 3,
            Error::Authentication(_) => 4,
            Error::NotFound(_) => 5,
            Error::Transport(_) => 6,
            Error::Io(_) => 7,
            Error::InvalidInput(_) => 8,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
