//! Error types for Acervo.
//!
//! Callers need to tell three situations apart: the record or query they
//! supplied is wrong (fix the input), the record they asked for does not
//! exist, or the engine is temporarily degraded (retry). The helpers
//! [`Error::is_bad_query`], [`Error::is_not_found`], and
//! [`Error::is_retryable`] encode that split.

use std::path::{Path, PathBuf};

/// Errors that can occur while indexing or searching records.
///
/// Marked `#[non_exhaustive]` so new failure modes can be added without
/// breaking downstream matches.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An operation belonging to the other identity strategy was invoked.
    #[error("strategy mismatch: `{operation}` is not available with {configured} identifiers")]
    StrategyMismatch {
        /// Operation that was rejected.
        operation: &'static str,
        /// Strategy the indexer was opened with.
        configured: &'static str,
    },

    /// A record field could not be turned into its stored string.
    #[error("mapping failure on field `{field}`: {message}")]
    MappingFailure {
        /// Field being mapped.
        field: String,
        /// What went wrong.
        message: String,
    },

    /// A stored string could not be parsed into the declared field type.
    #[error("conversion failure on field `{field}` ({type_name}) for value {value:?}: {message}")]
    ConversionFailure {
        /// Field being reconstructed.
        field: String,
        /// Declared type of the field.
        type_name: &'static str,
        /// Stored value that failed to parse.
        value: String,
        /// Parser message.
        message: String,
    },

    /// Point lookup matched no document.
    #[error("no document found for {key}")]
    NotFound {
        /// Rendering of the identifier or key that was looked up.
        key: String,
    },

    /// Query text could not be parsed.
    #[error("bad query {query:?}: {message}")]
    BadQuery {
        /// The query text as supplied.
        query: String,
        /// Parser message.
        message: String,
    },

    /// A search field is not part of the record schema.
    #[error("unknown search field `{field}`")]
    UnknownField {
        /// Name that was requested.
        field: String,
    },

    /// The engine ran out of a resource while performing an operation.
    ///
    /// When `recovered` is true a fresh write handle was opened and the
    /// operation was *not* applied; the caller should retry it.
    #[error("resource exhausted during {operation} (handle recovered: {recovered}): {message}")]
    ResourceExhausted {
        /// Operation that was interrupted.
        operation: &'static str,
        /// Whether the write handle was reopened.
        recovered: bool,
        /// Engine message.
        message: String,
    },

    /// A key object does not line up with the declared key fields.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// What is wrong with the key.
        message: String,
    },

    /// The on-disk index was built for a different record layout.
    #[error("incompatible index at {}: {message}", path.display())]
    IncompatibleIndex {
        /// Index directory.
        path: PathBuf,
        /// Why it cannot be used.
        message: String,
    },

    /// The indexer has already released its write handle.
    #[error("indexer is closed")]
    Closed,

    /// Invalid configuration or construction input.
    #[error("configuration error: {message}")]
    Config {
        /// What configuration is problematic.
        message: String,
    },

    /// I/O error with the path involved.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Any other failure reported by the search engine.
    #[error("engine error: {0}")]
    Engine(String),
}

/// Convenience `Result` alias used throughout Acervo.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether the failed operation may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ResourceExhausted { .. } | Error::Io { .. } => true,
            Error::StrategyMismatch { .. }
            | Error::MappingFailure { .. }
            | Error::ConversionFailure { .. }
            | Error::NotFound { .. }
            | Error::BadQuery { .. }
            | Error::UnknownField { .. }
            | Error::InvalidKey { .. }
            | Error::IncompatibleIndex { .. }
            | Error::Closed
            | Error::Config { .. }
            | Error::Engine(_) => false,
        }
    }

    /// Returns whether this is a point-lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns whether the search input (text or fields) was rejected.
    pub fn is_bad_query(&self) -> bool {
        matches!(self, Error::BadQuery { .. } | Error::UnknownField { .. })
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a mapping failure for a field.
    pub fn mapping<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::MappingFailure {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key<S: Into<String>>(message: S) -> Self {
        Error::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a not-found error for the rendered key.
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// Wraps an engine failure message.
    pub fn engine<S: Into<String>>(message: S) -> Self {
        Error::Engine(message.into())
    }

    /// Wraps an I/O error with the path that caused it.
    pub fn io_with_path(source: std::io::Error, path: &Path) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
