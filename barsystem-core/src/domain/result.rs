//! Result and error types for the core library

use thiserror::Error;

/// JSON-RPC error code the service returns when the session token is
/// missing, expired or not allowed to call the method.
pub const ACCESS_DENIED: i64 = -32001;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// Error object returned by the service, passed through unchanged
    #[error("{message}")]
    Rpc { code: i64, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Printer error: {0}")]
    Printer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a JSON-RPC error object
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// The JSON-RPC error code, if the service produced this error
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the service rejected the session
    pub fn is_access_denied(&self) -> bool {
        self.rpc_code() == Some(ACCESS_DENIED)
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
