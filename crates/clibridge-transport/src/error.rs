//! Transport error types

use std::fmt;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while driving a child process
#[derive(Debug)]
pub enum TransportError {
    /// The child could not be launched
    Spawn(String),

    /// I/O error on one of the child's pipes
    Io(std::io::Error),

    /// The child's input has already been closed
    Closed,

    /// Process error (signals, missing pid, wait failures)
    Process(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(msg) => write!(f, "Spawn error: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Closed => write!(f, "Child input is closed"),
            Self::Process(msg) => write!(f, "Process error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<nix::Error> for TransportError {
    fn from(err: nix::Error) -> Self {
        Self::Process(err.to_string())
    }
}
