//! Error types for Triage.
//!
//! Library crates use [`TriageError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Triage operations.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// Configuration loading or validation error, including a missing
    /// settings entry for the active provider.
    #[error("config error: {message}")]
    Config { message: String },

    /// Content could not be extracted from an artifact.
    #[error("extraction error: {reason}")]
    Extraction { reason: String },

    /// A model backend call failed (HTTP, auth, or reply shape).
    #[error("gateway error: {reason}")]
    Gateway { reason: String },

    /// Network/HTTP error outside of extraction and model calls.
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad id, invalid value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored artifact has no extracted content to reprocess.
    #[error("artifact {0} has no extracted content to reprocess")]
    MissingContent(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable reason.
    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::Extraction {
            reason: reason.into(),
        }
    }

    /// Create a gateway error from any displayable reason.
    pub fn gateway(reason: impl Into<String>) -> Self {
        Self::Gateway {
            reason: reason.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The bare failure text, without the category prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::Config { message } | Self::Validation { message } => message.clone(),
            Self::Extraction { reason } | Self::Gateway { reason } => reason.clone(),
            Self::Network(msg) | Self::Storage(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
