//! Session lifecycle events
//!
//! Provides:
//! - SessionEvent enum for lifecycle visibility
//! - EventHandler callbacks for observability
//!
//! # Example
//!
//! ```ignore
//! let session = ProcessSession::new_with_lifecycle(config, |event| {
//!     match event {
//!         SessionEvent::Started { pid, .. } => println!("child up: {}", pid),
//!         SessionEvent::ChildExited { pid, .. } => println!("child gone: {}", pid),
//!         _ => {}
//!     }
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback invoked for every lifecycle event
pub type EventHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Lifecycle events for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A child process was launched
    Started {
        /// OS process id
        pid: u32,
        /// Executable that was launched
        program: String,
    },

    /// Output queued before a command was discarded
    StaleOutputDiscarded {
        /// Process id of the child
        pid: u32,
        /// Number of chunks dropped
        chunks: usize,
    },

    /// A command line was written to the child
    CommandSent {
        /// Process id of the child
        pid: u32,
        /// Command text, without the trailing newline
        command: String,
    },

    /// A command returned without seeing the prompt marker
    ResponseIncomplete {
        /// Process id of the child
        pid: u32,
        /// Command text
        command: String,
        /// Bytes collected before giving up
        collected_bytes: usize,
    },

    /// The liveness check found the child gone
    ChildExited {
        /// Process id of the child
        pid: u32,
        /// Exit code, if it exited normally
        code: Option<i32>,
    },

    /// The session terminated its child
    Shutdown {
        /// Process id of the child
        pid: u32,
    },
}

impl SessionEvent {
    /// Process id of the child this event refers to
    pub fn pid(&self) -> u32 {
        match self {
            SessionEvent::Started { pid, .. } => *pid,
            SessionEvent::StaleOutputDiscarded { pid, .. } => *pid,
            SessionEvent::CommandSent { pid, .. } => *pid,
            SessionEvent::ResponseIncomplete { pid, .. } => *pid,
            SessionEvent::ChildExited { pid, .. } => *pid,
            SessionEvent::Shutdown { pid } => *pid,
        }
    }

    /// Get a human-readable description of this event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::Started { program, .. } => format!("Started {}", program),
            SessionEvent::StaleOutputDiscarded { chunks, .. } => {
                format!("Discarded {} stale output chunk(s)", chunks)
            }
            SessionEvent::CommandSent { command, .. } => format!("Sent command: {}", command),
            SessionEvent::ResponseIncomplete {
                command,
                collected_bytes,
                ..
            } => format!(
                "No prompt after '{}' ({} bytes collected)",
                command, collected_bytes
            ),
            SessionEvent::ChildExited { code: Some(code), .. } => {
                format!("Child exited with code {}", code)
            }
            SessionEvent::ChildExited { code: None, .. } => {
                "Child terminated by signal".to_string()
            }
            SessionEvent::Shutdown { .. } => "Session shut down".to_string(),
        }
    }
}
