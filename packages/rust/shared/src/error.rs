//! Error types for HanjaDeck.
//!
//! Library crates use [`HanjaDeckError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all HanjaDeck operations.
#[derive(Debug, thiserror::Error)]
pub enum HanjaDeckError {
    /// Caller misuse: malformed pattern, invalid selector, unreadable config.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Two record collections that must correspond positionally do not.
    #[error("consistency error: {message}")]
    Consistency { message: String },

    /// A tag field reference names a field the record does not have.
    #[error("missing field '{field}'")]
    MissingField { field: String },

    /// A record modifier rejected its input.
    #[error("modifier error: {message}")]
    Modifier { message: String },

    /// Tag template could not be parsed or filled.
    #[error("template error: {message}")]
    Template { message: String },

    /// Content source failure.
    #[error("content source error: {0}")]
    Source(#[from] SourceError),

    /// JSON or other data parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or sink error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure modes of a content source call.
///
/// The resolver and traversal treat every variant as "not found".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,

    #[error("no such entry")]
    NotFound,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HanjaDeckError>;

impl HanjaDeckError {
    /// Create a configuration error from any displayable message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a consistency error from any displayable message.
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency {
            message: msg.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a modifier error from any displayable message.
    pub fn modifier(msg: impl Into<String>) -> Self {
        Self::Modifier {
            message: msg.into(),
        }
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
}
