use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error types for a G-code transfer
#[derive(Error, Debug)]
pub enum Error {
    /// Payload file could not be stat'ed, opened or read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Resolve, dial, read, write or flush failure on the network stream
    #[error("Connection error: {context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Connection error: connection closed by peer")]
    ConnectionClosed,

    #[error("Connection error: {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Protocol error: oversized message (limit {limit} bytes)")]
    OversizedMessage { limit: usize },

    #[error("Protocol error: invalid status message {0:?}")]
    InvalidStatus(String),

    #[error("Protocol error: cannot start outside of init state (state: {0:?})")]
    UnexpectedState(String),

    #[error("Protocol error: did not receive ack (message: {0:?})")]
    MissingAck(String),

    #[error("Protocol error: payload length mismatch (declared {declared}, sent {sent})")]
    PayloadLength { declared: u64, sent: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classes reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Protocol,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
        }
    }
}

impl Error {
    /// Creates a new connection error wrapping a stream failure
    pub fn connection(context: impl Into<String>, source: io::Error) -> Self {
        Error::Connection {
            context: context.into(),
            source,
        }
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Classifies the error into the transfer error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Connection { .. } | Error::ConnectionClosed | Error::Timeout { .. } => {
                ErrorKind::Connection
            }
            Error::OversizedMessage { .. }
            | Error::InvalidStatus(_)
            | Error::UnexpectedState(_)
            | Error::MissingAck(_)
            | Error::PayloadLength { .. }
            | Error::InvalidState(_) => ErrorKind::Protocol,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}
