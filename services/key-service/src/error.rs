//! API error taxonomy
//!
//! Every handler failure is a [`KeyServiceError`]. Each variant maps to one
//! [`ErrorCode`] and one HTTP status, and renders as
//! `{"error":"<message>","code":"<ERROR_CODE>"}`. Storage errors keep their
//! detail for logs; clients only see the sanitized message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;
use crate::urn::UrnError;

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum KeyServiceError {
    /// No authenticated subject on the request
    #[error("Unauthorized: No user ID in token")]
    Unauthorized,

    /// Path identifier did not parse
    #[error("Invalid URN format")]
    InvalidUrn(#[source] UrnError),

    /// Authenticated subject does not own the identifier
    #[error("Forbidden: You can only store your own key")]
    Forbidden {
        /// Subject taken from the token
        subject: String,
        /// Entity id taken from the path
        entity_id: String,
    },

    /// Request body is not a key pair document
    #[error("Invalid JSON body format")]
    InvalidBody(#[source] serde_json::Error),

    /// One of the keys was empty
    #[error("encKey and sigKey must not be empty")]
    EmptyKeys,

    /// No usable document for the identifier
    #[error("Key not found")]
    NotFound(#[source] StorageError),

    /// Write to storage failed
    #[error("Failed to store public keys")]
    StoreFailed(#[source] StorageError),

    /// Read from storage failed
    #[error("Failed to retrieve public keys")]
    RetrieveFailed(#[source] StorageError),

    /// Request aborted by shutdown or deadline
    #[error("Service unavailable")]
    Unavailable(#[source] StorageError),

    /// Anything else (details sanitized in responses)
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// 401
    Unauthorized,
    /// 400, bad identifier
    InvalidUrn,
    /// 403
    Forbidden,
    /// 400, bad body
    InvalidBody,
    /// 400, empty key
    EmptyKeys,
    /// 404
    NotFound,
    /// 500 from storage
    StorageFailure,
    /// 503
    Unavailable,
    /// 500
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "AUTH_UNAUTHORIZED",
            Self::InvalidUrn => "INVALID_URN",
            Self::Forbidden => "AUTH_FORBIDDEN",
            Self::InvalidBody => "INVALID_BODY",
            Self::EmptyKeys => "EMPTY_KEYS",
            Self::NotFound => "KEY_NOT_FOUND",
            Self::StorageFailure => "STORAGE_FAILURE",
            Self::Unavailable => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidUrn | Self::InvalidBody | Self::EmptyKeys => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::StorageFailure | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl KeyServiceError {
    /// Maps a failed read. A missing or unreadable document is a 404.
    #[must_use]
    pub fn from_read(err: StorageError) -> Self {
        if err.is_not_found() || err.is_unknown_format() {
            Self::NotFound(err)
        } else if err.is_aborted() {
            Self::Unavailable(err)
        } else {
            Self::RetrieveFailed(err)
        }
    }

    /// Maps a failed write.
    #[must_use]
    pub fn from_write(err: StorageError) -> Self {
        if err.is_aborted() {
            Self::Unavailable(err)
        } else {
            Self::StoreFailed(err)
        }
    }

    /// Error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::InvalidUrn(_) => ErrorCode::InvalidUrn,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::InvalidBody(_) => ErrorCode::InvalidBody,
            Self::EmptyKeys => ErrorCode::EmptyKeys,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::StoreFailed(_) | Self::RetrieveFailed(_) => ErrorCode::StorageFailure,
            Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.code().status_code()
    }

    /// Short label used as the metrics outcome
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self.code() {
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::InvalidUrn | ErrorCode::InvalidBody | ErrorCode::EmptyKeys => {
                "invalid_request"
            }
            ErrorCode::NotFound => "not_found",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::StorageFailure | ErrorCode::Internal => "error",
        }
    }
}

/// JSON body of every error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message (sanitized)
    pub error: String,
    /// Error code for programmatic handling
    pub code: &'static str,
}

impl From<&KeyServiceError> for ErrorResponse {
    fn from(err: &KeyServiceError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code().as_str(),
        }
    }
}

impl IntoResponse for KeyServiceError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}
