//! Error types for chat completion backends, the trace sink and configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while performing a chat completion
///
/// Errors from the underlying backend are passed through the interception layer
/// unchanged; `EditHook`, `Serialization` and `TraceWrite` originate in the layer
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Authentication failed or credentials are invalid
    AuthenticationError { message: String },

    /// Request timed out after the specified duration (in seconds)
    TimeoutError { seconds: u64 },

    /// Rate limit exceeded, retry after the specified duration (in seconds)
    RateLimitError { retry_after: Option<u64> },

    /// Invalid or malformed response from the LLM
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Configuration error (missing API keys, invalid settings, etc.)
    ConfigurationError { message: String },

    /// Network-related error
    NetworkError { message: String },

    /// The installed editing hook rejected the outgoing messages
    EditHook { message: String },

    /// A trace record could not be serialized
    Serialization { message: String },

    /// A trace record could not be written to the open log file
    TraceWrite { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from LLM: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::EditHook { message } => {
                write!(f, "Editing hook failed: {}", message)
            }
            BackendError::Serialization { message } => {
                write!(f, "Failed to serialize trace record: {}", message)
            }
            BackendError::TraceWrite { message } => {
                write!(f, "Failed to write trace record: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Errors raised while attaching a log destination
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to open trace log {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The client library version could not be parsed
    #[error("Invalid API version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Unknown explicit shape name
    #[error("Invalid API shape: {0}. Valid options: flat, structured")]
    InvalidShape(String),

    /// No model configured
    #[error("Model name must not be empty")]
    MissingModel,

    /// Endpoint is not an http(s) URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Backend initialization failed
    #[error("Backend initialization failed: {0}")]
    Backend(#[from] BackendError),
}
