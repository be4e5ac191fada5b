//! Error handling for the chat server

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat server error types
#[derive(Debug, Error)]
pub enum ChatError {
    /// Generic I/O errors on a socket
    #[error("Network error: {0}")]
    Network(String),
    /// A client sent something the protocol does not accept
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Requested display name is held by another session
    #[error("Name conflict: {0}")]
    NameConflict(String),
    /// Transport-level failure on an established connection
    #[error("Connection error: {0}")]
    Connection(String),
    /// The listener could not acquire its address
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// Server internal error
    #[error("Internal error: {0}")]
    Internal(String),
    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),
    /// The server is tearing down and no longer accepts participants
    #[error("Server is shutting down")]
    ShuttingDown,
}

impl ChatError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            ChatError::Network(_) => 1000,
            ChatError::Protocol(_) => 1003,
            ChatError::NameConflict(_) => 1004,
            ChatError::Connection(_) => 1005,
            ChatError::Bind { .. } => 1006,
            ChatError::Internal(_) => 1009,
            ChatError::Timeout(_) => 1011,
            ChatError::ShuttingDown => 1013,
        }
    }

    /// Whether the session that hit this error can recover by re-prompting
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChatError::Protocol(_) | ChatError::NameConflict(_))
    }

    /// Create a protocol error
    pub fn protocol<T: Into<String>>(msg: T) -> Self {
        ChatError::Protocol(msg.into())
    }

    /// Create a name conflict error
    pub fn name_conflict<T: Into<String>>(name: T) -> Self {
        ChatError::NameConflict(name.into())
    }

    /// Create a connection error
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        ChatError::Connection(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        ChatError::Timeout(msg.into())
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Network(format!("IO error: {}", err))
    }
}

/// Why a name claim was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// Not 1 to 12 ASCII letters or digits
    #[error("invalid_format")]
    InvalidFormat,
    /// Another live session holds the name
    #[error("name_taken")]
    NameTaken,
    /// Registry was shut down
    #[error("shutting_down")]
    ShuttingDown,
}

impl RegisterError {
    /// Convert into a [`ChatError`] naming the rejected input
    pub fn into_chat_error(self, name: &str) -> ChatError {
        match self {
            RegisterError::InvalidFormat => {
                ChatError::protocol(format!("invalid display name {:?}", name))
            }
            RegisterError::NameTaken => ChatError::name_conflict(name),
            RegisterError::ShuttingDown => ChatError::ShuttingDown,
        }
    }
}
