//! Provider error types and classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when talking to an LLM provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderError {
    /// Rate limit exceeded, retry after specified duration
    RateLimit { retry_after: Option<Duration> },

    /// Request timeout
    Timeout,

    /// Temporary server error (5xx)
    ServerError { status_code: u16, message: String },

    /// Invalid request that should not be retried (4xx)
    InvalidRequest { message: String },

    /// Authentication failure
    AuthenticationError,

    /// Model not available or unsupported
    ModelNotAvailable { model: String },

    /// Connection could not be established or was dropped
    NetworkError { message: String },

    /// Response body could not be decoded
    ParseError(String),

    /// Provider-specific error
    Custom { code: String, message: String },
}

/// Coarse classification of provider failures.
///
/// Retry policies are expressed as a set of kinds; each provider declares
/// which kinds it considers transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    ServerError,
    Connection,
    Timeout,
    Authentication,
    InvalidRequest,
    ModelNotAvailable,
    Other,
}

impl ProviderError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Timeout => ErrorKind::Timeout,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::AuthenticationError => ErrorKind::Authentication,
            Self::ModelNotAvailable { .. } => ErrorKind::ModelNotAvailable,
            Self::NetworkError { .. } => ErrorKind::Connection,
            Self::ParseError(_) | Self::Custom { .. } => ErrorKind::Other,
        }
    }

    /// Delay hinted by the provider (e.g. a Retry-After header)
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimit { retry_after } => {
                if let Some(duration) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {:?}", duration)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            Self::Timeout => write!(f, "Request timeout"),
            Self::ServerError {
                status_code,
                message,
            } => write!(f, "Server error ({}): {}", status_code, message),
            Self::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            Self::AuthenticationError => write!(f, "Authentication failed"),
            Self::ModelNotAvailable { model } => write!(f, "Model '{}' not available", model),
            Self::NetworkError { message } => write!(f, "Network error: {}", message),
            Self::ParseError(message) => write!(f, "Failed to parse response: {}", message),
            Self::Custom { code, message } => write!(f, "Error [{}]: {}", code, message),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() {
            ProviderError::NetworkError {
                message: format!("Connection failed: {}", err),
            }
        } else if err.is_decode() {
            ProviderError::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => ProviderError::AuthenticationError,
                429 => ProviderError::RateLimit { retry_after: None },
                code @ 500..=599 => ProviderError::ServerError {
                    status_code: code,
                    message: err.to_string(),
                },
                _ => ProviderError::InvalidRequest {
                    message: err.to_string(),
                },
            }
        } else {
            ProviderError::NetworkError {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}
