//! Managed sessions for prompt-driven command-line programs
//!
//! clibridge keeps one interactive child process alive behind a serialized
//! command interface, so a long-running service can drive a REPL-style tool
//! (for example a shared-memory allocator shell) one request at a time.
//!
//! # Key Features
//!
//! - **Output pump**: a background task frames the child's merged
//!   stdout/stderr into chunks at each newline and at the prompt marker
//! - **Command lock**: one command in flight; stale output is discarded
//!   before each write
//! - **Soft timeouts**: a missing prompt yields the partial response, not an
//!   error
//! - **Bootstrap**: locate a prebuilt executable or compile it from source
//! - **Bridge**: request-shaped start/command replies for HTTP handlers
//!
//! # Architecture
//!
//! 1. **Transport Layer** (`clibridge-transport`): spawning and pipes
//! 2. **Session Layer** (this crate): framing, command protocol, bootstrap
//!
//! # Usage Example
//!
//! ```no_run
//! use clibridge::{Bridge, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = Bridge::new(BridgeConfig::from_env());
//!     bridge.start().await?;
//!
//!     let reply = bridge.command("alloc 1 256").await;
//!     println!("{}", reply.output.unwrap_or_default());
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pump;
pub mod session;

// Re-export commonly used types
pub use bootstrap::{BinaryResolver, Bootstrap, FixedBinary};
pub use bridge::{Bridge, CommandReply, StartReply, StartState};
pub use config::{BootstrapConfig, BridgeConfig, DEFAULT_PROMPT, SessionConfig};
pub use error::{BootstrapError, ErrorRecovery, Result, SessionError};
pub use lifecycle::{EventHandler, SessionEvent};
pub use pump::{ChunkFramer, OutputPump, PumpSummary};
pub use session::{ProcessSession, SessionState, SessionStats, StartStatus};
