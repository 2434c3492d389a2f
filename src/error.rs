//! Error types for the database admin client.
//!
//! This module defines all error types using `thiserror`. The variants follow
//! the taxonomy the sync layer cares about: failures before dispatch
//! (validation, confirmation), failures with no usable response (transport,
//! decode), and failures reported by the backend inside the envelope.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request failed: {message}")]
    Transport { message: String },

    /// The backend answered with `success: false`; the message is shown verbatim.
    #[error("{message}")]
    Envelope { message: String },

    #[error("Invalid response: {message}")]
    Decode { message: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Confirmation required: {operation}. {reason}")]
    ConfirmationRequired { operation: String, reason: String },

    #[error(
        "Table '{table}' has no primary key. Rows can only be edited or deleted by primary key."
    )]
    MissingPrimaryKey { table: String },

    #[error("Token storage error: {message}")]
    Storage { message: String },
}

impl ApiError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an envelope error from the server's message.
    pub fn envelope(message: impl Into<String>) -> Self {
        Self::Envelope {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a client-side validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a confirmation required error for a destructive operation.
    pub fn confirmation_required(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfirmationRequired {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing primary key error.
    pub fn missing_primary_key(table: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            table: table.into(),
        }
    }

    /// Create a token storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Only failures where no response arrived are retried; the backend's own
    /// answers are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if the request never left the client.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::ConfirmationRequired { .. } | Self::MissingPrimaryKey { .. }
        )
    }
}

/// Convert reqwest errors to ApiError.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::decode(err.to_string())
        } else if err.is_timeout() {
            ApiError::transport(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ApiError::transport(format!("Could not reach the API server: {}", err))
        } else {
            ApiError::transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::decode(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::storage(err.to_string())
    }
}

/// Result type alias for client operations.
pub type ApiResult<T> = Result<T, ApiError>;
