//! Unified error types for cahier.
//!
//! Durable learning data never fails open: archival and scheduling writes
//! propagate every error to the caller. Only the settings sync path degrades
//! to the local value, through the [`FailOpen`] helpers below.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for cahier operations.
#[derive(Error, Debug)]
pub enum CahierError {
    /// I/O errors from the file-backed document store.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Document store failures (remote unavailable, rejected batch).
    #[error("backend error: {message}")]
    Backend { message: String },

    /// JSON or TOML serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// The content generator failed (network, auth or unparseable output).
    #[error("generation failed: {message}")]
    Generation { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// Caller passed something the archive cannot accept.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Review item not found in the active backend.
    #[error("review item not found: {id}")]
    ItemNotFound { id: String },
}

/// A specialized Result type for cahier operations.
pub type Result<T> = std::result::Result<T, CahierError>;

impl CahierError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an item not found error.
    pub fn item_not_found(id: impl Into<String>) -> Self {
        Self::ItemNotFound { id: id.into() }
    }

    /// Whether retrying the same call against the backend could succeed.
    ///
    /// Writes are idempotent by id, so a caller may always retry these.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Storage { .. })
    }
}

impl From<io::Error> for CahierError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for CahierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Fail-open handling for non-authoritative data.
///
/// Log the error and carry on with a fallback. Only settings sync and the
/// mirror cache use this; learning data must propagate its errors.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "{} (fail-open: using default)", context);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "{} (fail-open: using fallback)", context);
                fallback
            }
        }
    }
}

/// Process exit codes for the CLI.
pub mod exit_codes {
    /// Command succeeded.
    pub const SUCCESS: i32 = 0;

    /// Command failed; details were printed.
    pub const FAILURE: i32 = 1;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}
