//! # Error Types
//!
//! Custom error types for Wattmeter Monitor using `thiserror`.
//!
//! Every variant belongs to an [`ErrorKind`], which is what consumers of the
//! connection event channel usually match on. Decode errors are local to one
//! frame; connection errors end the session.

use std::fmt;

use thiserror::Error;

/// Where a connection was in its lifecycle when the transport failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// The session never reached the open state
    Establishing,

    /// The session was open and has been lost
    Lost,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Establishing => f.write_str("establishing"),
            ConnectionPhase::Lost => f.write_str("lost"),
        }
    }
}

/// Coarse classification of a [`MonitorError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A single frame could not be decoded
    Decode,

    /// The transport failed to connect or dropped
    Connection,

    /// The API was called with an invalid argument or in an invalid state
    Usage,

    /// Configuration could not be loaded or is invalid
    Config,

    /// File system or serialization failure
    Io,
}

/// Main error type for Wattmeter Monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Frame (or package record) shorter than the fixed wire size
    #[error("Frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    /// Legacy frame whose length is not a whole number of sample records
    #[error("Misaligned frame: {len} bytes is not a multiple of {record_size}")]
    MisalignedFrame { len: usize, record_size: usize },

    /// Text message where a binary frame was expected
    #[error("Unexpected text message ({len} bytes), expected a binary frame")]
    UnexpectedText { len: usize },

    /// Transport failed while connecting, or after the connection was up
    #[error("Connection error ({phase}): {message}")]
    Connection {
        phase: ConnectionPhase,
        message: String,
    },

    /// Connection target is not a WebSocket URL
    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),

    /// Operation not allowed in the connection's current state
    #[error("Invalid connection state: {0}")]
    InvalidState(String),

    /// Transport operation (send, close) failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sample record serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonitorError {
    /// Build a connection error for `target` from a transport description
    pub fn connection(phase: ConnectionPhase, target: &str, description: &str) -> Self {
        let message = match phase {
            ConnectionPhase::Establishing => {
                format!("Failed connecting to {}: {}", target, description)
            }
            ConnectionPhase::Lost => format!("Connection to {} lost: {}", target, description),
        };
        MonitorError::Connection { phase, message }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MonitorError::FrameTooShort { .. }
            | MonitorError::MisalignedFrame { .. }
            | MonitorError::UnexpectedText { .. } => ErrorKind::Decode,
            MonitorError::Connection { .. } | MonitorError::Transport(_) => ErrorKind::Connection,
            MonitorError::InvalidTarget(_) | MonitorError::InvalidState(_) => ErrorKind::Usage,
            MonitorError::Config(_) => ErrorKind::Config,
            MonitorError::Io(_) | MonitorError::Json(_) => ErrorKind::Io,
        }
    }

    /// Whether a session keeps running after reporting this error
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Decode
    }
}

/// Result type alias for Wattmeter Monitor
pub type Result<T> = std::result::Result<T, MonitorError>;
