//! Error types for sessions and bootstrap
//!
//! Every failure is surfaced to the immediate caller; nothing is retried
//! internally. A command that merely timed out is not an error: it returns
//! whatever output was collected.

use clibridge_transport::TransportError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error recovery guidance
///
/// Gives a request handler something actionable to show the user.
pub trait ErrorRecovery {
    /// Whether retrying the same call could succeed without intervention
    fn is_retriable(&self) -> bool;

    /// User-facing action to take
    fn suggested_action(&self) -> &str;
}

/// Errors that can occur while driving a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// No live child process: never started, or it has exited
    #[error("CLI process is not running. Build and start the binary first.")]
    NotRunning,

    /// The bridge has not created a session yet
    #[error("CLI not started")]
    NotStarted,

    /// The command text was empty after trimming
    #[error("cmd required")]
    EmptyCommand,

    /// Writing or flushing the command to the child's input failed
    #[error("Failed to write command: {0}")]
    WriteFailure(#[source] TransportError),

    /// The child could not be launched
    #[error("Failed to start CLI process: {0}")]
    Spawn(#[source] TransportError),

    /// The executable could not be located or built
    #[error("Failed to locate or build CLI binary: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Other transport failure (termination, signalling)
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ErrorRecovery for SessionError {
    fn is_retriable(&self) -> bool {
        false
    }

    fn suggested_action(&self) -> &str {
        match self {
            Self::NotRunning => "Start the session again; the CLI process has exited.",
            Self::NotStarted => "Call start before sending commands.",
            Self::EmptyCommand => "Send a non-empty command.",
            Self::WriteFailure(_) => {
                "The CLI stopped reading its input. Check its output and restart the session."
            }
            Self::Spawn(_) => "Check that the executable exists and is runnable.",
            Self::Bootstrap(BootstrapError::MissingRoot(_)) => {
                "Point the bootstrap root at the project directory."
            }
            Self::Bootstrap(_) => {
                "Build the CLI binary manually or set CXX to a working compiler."
            }
            Self::Transport(_) => "Check process logs for details.",
        }
    }
}

/// Errors from locating or compiling the child executable
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The project root does not exist or is not a directory
    #[error("Project root is not a directory: {}", .0.display())]
    MissingRoot(PathBuf),

    /// The compiler could not be launched
    #[error("Failed to run compiler {compiler}: {source}")]
    CompilerSpawn {
        /// Compiler program
        compiler: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran and failed
    #[error("Compiler exited with {}: {stderr}", .status.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    CompilerFailed {
        /// Exit code, if the compiler was not killed by a signal
        status: Option<i32>,
        /// Captured compiler diagnostics
        stderr: String,
    },
}
