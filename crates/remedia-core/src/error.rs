//! Error types for remedia-core

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::util::compact_text;

/// Result type alias using remedia-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in remedia-core operations.
///
/// Errors are `Clone` so a failed query can be handed to every consumer of
/// the same cache key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport failure before any HTTP status was received
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("{message} ({status})")]
    Http { status: u16, message: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No active session where one is required
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Secure session storage error
    #[error("Secure storage error: {0}")]
    SecureStorage(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Closed error taxonomy used for user-facing messages and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Server,
    Client,
    Unknown,
}

impl ErrorKind {
    /// Short message suitable for a toast notification.
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Network => "Unable to reach the server. Check your connection and try again.",
            Self::Validation => "Some of the submitted information is invalid.",
            Self::Authentication => "Please sign in to continue.",
            Self::Authorization => "You do not have permission to do that.",
            Self::NotFound => "The requested item could not be found.",
            Self::Server => "The server ran into a problem. Please try again later.",
            Self::Client => "The request could not be completed.",
            Self::Unknown => "Something went wrong.",
        }
    }

    /// Kind for a bare HTTP status code.
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 409 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Network,
            405..=499 => Self::Client,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into the closed taxonomy.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Http { status, .. } => ErrorKind::from_status(*status),
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::Unauthenticated(_) => ErrorKind::Authentication,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Server,
            Self::Serialization(_) | Self::Config(_) | Self::SecureStorage(_) => {
                ErrorKind::Client
            }
            Self::Other(_) => ErrorKind::Unknown,
        }
    }

    /// HTTP status carried by this error, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a failed query fetch may be retried.
    ///
    /// Client errors (400-499) fail fast except 408 and 429. Deterministic
    /// local failures never succeed on retry.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                !matches!(*status, 400..=499) || matches!(*status, 408 | 429)
            }
            Self::Network(_) | Self::Storage(_) | Self::Io(_) | Self::Other(_) => true,
            Self::InvalidInput(_)
            | Self::Unauthenticated(_)
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::SecureStorage(_) => false,
        }
    }

    /// Build an HTTP error from a BaaS error response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::http(status, parse_api_message(status, body))
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::http(status.as_u16(), error.to_string()),
            None if error.is_decode() => Self::Serialization(error.to_string()),
            None => Self::Network(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_message(status: u16, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return message.trim().to_string();
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .map_or_else(|| format!("HTTP {status}"), ToString::to_string)
    } else {
        trimmed
    }
}
