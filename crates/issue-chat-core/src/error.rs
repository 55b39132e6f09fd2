//! Error types for issue-chat operations.
//!
//! Every error in this module is `Clone`: the in-flight registry hands one
//! settled result to all callers waiting on the same request key, so the
//! failure has to be shareable. Transport errors from `reqwest` are therefore
//! captured as messages rather than wrapped.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors during GitHub API operations.
///
/// Transport failures (`NetworkUnreachable`, `Timeout`) are kept apart from
/// responses the server actually produced so callers can tell "check your
/// connection" from "the API said no".
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never reached the server (DNS, refused connection, TLS).
    #[error("Network unreachable: {message}")]
    NetworkUnreachable { message: String },

    /// Request to GitHub API timed out.
    #[error("Request timeout")]
    Timeout,

    /// Non-success HTTP response from GitHub API.
    #[error("HTTP error: {status} - {message}")]
    HttpError {
        status: u16,
        message: String,
        documentation_url: Option<String>,
    },

    /// Rate limit exceeded. Operations should wait until reset time.
    /// `status` is the 403 or 429 the server answered with.
    #[error("Rate limit exceeded. Reset at: {reset_at}")]
    RateLimitExceeded { status: u16, reset_at: DateTime<Utc> },

    /// GraphQL answered with an `errors` list, or with a null node.
    #[error("GraphQL error: {message}")]
    GraphQl { message: String, not_found: bool },

    /// Failed to parse JSON response from GitHub API.
    #[error("JSON parsing error: {message}")]
    Json { message: String },

    /// Client could not be configured or a request could not be built.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ApiError {
    /// HTTP status code carried by this error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            Self::RateLimitExceeded { status, .. } => Some(*status),
            Self::GraphQl {
                not_found: true, ..
            } => Some(404),
            _ => None,
        }
    }

    /// Whether the resource is absent (404 or a GraphQL not-found sentinel).
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the error means "no access": GitHub answers 404 for private
    /// repositories the token cannot see, so both 403 and 404 count.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::HttpError {
                status: 403 | 404,
                ..
            }
        )
    }

    /// Whether the request never reached the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::NetworkUnreachable { .. } | Self::Timeout)
    }

    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// Transient conditions include:
    /// - Server errors (5xx)
    /// - Rate limiting (429)
    /// - Request timeouts
    /// - Network/transport errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkUnreachable { .. } => true,
            Self::Timeout => true,
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::RateLimitExceeded { .. } => true,
            Self::GraphQl { .. } => false,
            Self::Json { .. } => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Short message suitable for showing to a person.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnreachable { .. } | Self::Timeout => {
                "Check your network connection.".to_string()
            }
            Self::HttpError { status: 401, .. } => "You need to log in again.".to_string(),
            Self::HttpError { status: 403, .. } => {
                "You do not have access to this repository.".to_string()
            }
            Self::HttpError { status: 404, .. } => {
                "The requested item could not be found.".to_string()
            }
            Self::RateLimitExceeded { reset_at, .. } => {
                format!("API rate limit exceeded; try again after {}.", reset_at)
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Json {
                message: err.to_string(),
            }
        } else if err.is_builder() {
            Self::Configuration {
                message: err.to_string(),
            }
        } else {
            Self::NetworkUnreachable {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

/// Input validation errors, raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing.
    #[error("Required field missing: {field}")]
    Required { field: String },

    /// A field has an invalid format.
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    /// A field value is out of the acceptable range.
    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

impl ValidationError {
    pub(crate) fn required(field: impl Into<String>) -> Self {
        Self::Required {
            field: field.into(),
        }
    }

    pub(crate) fn too_long(field: impl Into<String>, max: usize) -> Self {
        Self::OutOfRange {
            field: field.into(),
            message: format!("must be at most {} characters", max),
        }
    }
}

/// Errors reading or writing the persisted credential.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// No location is available to store the credential.
    #[error("No credential storage location available")]
    Unavailable,

    /// Reading or writing the credential failed.
    #[error("Credential storage I/O failed for {path}: {message}")]
    Io { path: String, message: String },
}

/// Top-level error for chat client and session operations.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// GitHub API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Input was rejected before any request was sent.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Credential storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ChatError {
    /// The underlying API error, if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this error was raised before any network traffic happened.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Short message suitable for showing to a person.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Standard result type for issue-chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
