//! Error types for the ticketing core

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors produced by the cipher, transport, session and realtime layers
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ciphertext could not be turned back into JSON
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Payload could not be encrypted
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Request could not be built from the caller's input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server rejected the session; local session state has been cleared
    #[error("Unauthorized: server responded with status {status}")]
    Unauthorized { status: StatusCode },

    /// Non-success response from the API
    #[error("API error {status}: {message}")]
    Api {
        status: StatusCode,
        message: String,
        body: crate::transport::ResponseBody,
    },

    /// Session storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed realtime frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Websocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing failure
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a decryption error
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption(message.into())
    }

    /// Create an encryption error
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption(message.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether this error ended the session
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { status } | Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }
}
