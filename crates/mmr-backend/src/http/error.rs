/*
[INPUT]:  Error sources (HTTP, backend responses, serialization, auth)
[OUTPUT]: Structured error types with retry and user-facing hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::ErrorBody;

/// Postgres unique violation code surfaced by the data API.
const UNIQUE_VIOLATION: &str = "23505";

/// Main error type for the backend collaborators
#[derive(Error, Debug)]
pub enum BackendError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error response
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// No session, or the session expired
    #[error("Authentication required, please sign in again")]
    AuthRequired,

    /// Credentials were rejected
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Manufacturing number already in use
    #[error("Manufacturing number '{number}' already exists")]
    DuplicateIdentifier { number: String },

    /// Remote record does not exist
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    /// Connection timeout
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },
}

impl BackendError {
    /// Check if the error is retryable. Retryable errors are the
    /// "remote unavailable" class: the request may succeed later unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http(_)
            | BackendError::RateLimit { .. }
            | BackendError::Timeout { .. }
            | BackendError::InvalidResponse(_) => true,
            BackendError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Alias used by callers that degrade on backend outages.
    pub fn is_remote_unavailable(&self) -> bool {
        self.is_retryable()
    }

    /// Get retry delay in seconds (if retryable)
    pub fn retry_delay(&self) -> Option<u64> {
        match self {
            BackendError::RateLimit { retry_after } => Some(*retry_after),
            BackendError::Timeout { .. } => Some(1),
            _ => None,
        }
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BackendError::AuthRequired | BackendError::Authentication { .. }
        )
    }

    /// True for unique-key violations reported by the data API.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            BackendError::DuplicateIdentifier { .. } => true,
            BackendError::Api {
                status,
                code,
                message,
            } => {
                *status == StatusCode::CONFLICT.as_u16()
                    || code.as_deref() == Some(UNIQUE_VIOLATION)
                    || message.contains("duplicate key value")
            }
            _ => false,
        }
    }

    /// Short message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::AuthRequired => {
                "Could not authenticate. Please sign in again.".to_string()
            }
            BackendError::Authentication { message } => message.clone(),
            BackendError::DuplicateIdentifier { .. } => {
                "This manufacturing number already exists. Please use a different number."
                    .to_string()
            }
            BackendError::NotFound { .. } => "The order no longer exists.".to_string(),
            err if err.is_retryable() => {
                "The server is unavailable. The change was kept locally and will be retried."
                    .to_string()
            }
            other => other.to_string(),
        }
    }

    /// Create an API error from status code and an optional decoded body
    pub fn api_error(status: StatusCode, body: Option<ErrorBody>) -> Self {
        let body = body.unwrap_or_default();
        let message = body
            .best_message()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        BackendError::Api {
            status: status.as_u16(),
            code: body.code(),
            message,
        }
    }
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
