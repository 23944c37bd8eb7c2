//! Storage error types and result alias.
//!
//! Every variant carries the canonical URN it concerns so callers can log
//! without re-threading the identifier. Backends map their native errors onto
//! these variants; the API layer performs the final kind → status mapping.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during key storage operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// No document exists for the identifier.
    #[error("key for entity {urn} not found")]
    NotFound {
        /// Canonical URN that was looked up
        urn: String,
    },

    /// A document exists but matches neither the current nor the legacy shape.
    #[error("failed to parse key document for entity {urn}: unknown format")]
    UnknownFormat {
        /// Canonical URN of the malformed document
        urn: String,
    },

    /// The backend could not be reached.
    #[error("storage connection error for entity {urn}: {message}")]
    Connection {
        /// Canonical URN of the operation
        urn: String,
        /// Backend-provided description
        message: String,
    },

    /// Any other backend failure.
    #[error("storage backend error for entity {urn}: {message}")]
    Backend {
        /// Canonical URN of the operation
        urn: String,
        /// Backend-provided description
        message: String,
    },

    /// The caller cancelled the operation before it completed.
    #[error("storage operation for entity {urn} cancelled")]
    Cancelled {
        /// Canonical URN of the operation
        urn: String,
    },

    /// The operation did not complete before the request deadline.
    #[error("storage operation for entity {urn} timed out after {duration:?}")]
    Timeout {
        /// Canonical URN of the operation
        urn: String,
        /// Deadline that was exceeded
        duration: Duration,
    },
}

impl StorageError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(urn: impl Into<String>) -> Self {
        Self::NotFound { urn: urn.into() }
    }

    /// Create an unknown format error.
    #[must_use]
    pub fn unknown_format(urn: impl Into<String>) -> Self {
        Self::UnknownFormat { urn: urn.into() }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(urn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            urn: urn.into(),
            message: message.into(),
        }
    }

    /// Create a generic backend error.
    #[must_use]
    pub fn backend(urn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            urn: urn.into(),
            message: message.into(),
        }
    }

    /// The identifier has no stored document.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The stored document could not be interpreted.
    #[must_use]
    pub const fn is_unknown_format(&self) -> bool {
        matches!(self, Self::UnknownFormat { .. })
    }

    /// The operation was aborted by cancellation or deadline.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Timeout { .. })
    }

    /// Canonical URN the error refers to.
    #[must_use]
    pub fn urn(&self) -> &str {
        match self {
            Self::NotFound { urn }
            | Self::UnknownFormat { urn }
            | Self::Connection { urn, .. }
            | Self::Backend { urn, .. }
            | Self::Cancelled { urn }
            | Self::Timeout { urn, .. } => urn,
        }
    }
}
