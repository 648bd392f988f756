//! Domain-level error types for cookie-relay.
//!
//! All errors are typed with `thiserror` and provide meaningful context
//! without exposing internal details to end users.

use thiserror::Error;

use super::auth::AuthErrorKind;

/// Application-level errors, mapped onto HTTP statuses by the API layer.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input supplied by the caller.
    #[error("{message}")]
    Validation { message: String },

    /// Credential rejected or identity provider unavailable.
    #[error("{}", kind.message())]
    Auth { kind: AuthErrorKind },

    /// The record store rejected the operation or could not be reached.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Requested record does not exist.
    #[error("{message}")]
    NotFound { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an auth error of the given kind.
    pub const fn auth(kind: AuthErrorKind) -> Self {
        Self::Auth { kind }
    }

    /// Create a storage error from a rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a storage error without an underlying source.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Whether the message is safe to show to a caller as-is.
    ///
    /// Storage, IO, config and parse failures carry internal details.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Auth { .. } | Self::NotFound { .. }
        )
    }

    /// Message suitable for a production response.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_public() {
            self.to_string()
        } else {
            "Something went wrong".to_string()
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
