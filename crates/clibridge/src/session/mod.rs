//! Managed interactive subprocess session
//!
//! A [`ProcessSession`] owns one child process, the background
//! [`OutputPump`](crate::pump::OutputPump) draining its output, and the queue
//! between them. Commands are serialized: each one discards stale output,
//! writes its line, and collects chunks until the prompt marker or its
//! deadline.
//!
//! # Module Organization
//!
//! - [`state`] - Session state, start status and diagnostics counters
//! - [`core`] - ProcessSession struct and lifecycle (new, start, shutdown)
//! - [`command`] - Command protocol (drain, write, collect)
//!
//! # Examples
//!
//! ```no_run
//! # use clibridge::{ProcessSession, SessionConfig};
//! # use std::time::Duration;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = ProcessSession::new(SessionConfig::new("./shm_cli"));
//! session.start().await?;
//!
//! let output = session.send_command("alloc 1 128", Duration::from_millis(2500)).await?;
//! print!("{}", output);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod core;
pub mod state;

// Re-export public types
pub use self::core::ProcessSession;
pub use self::state::{SessionState, SessionStats, StartStatus};
