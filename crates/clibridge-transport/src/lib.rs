//! Child process plumbing for clibridge
//!
//! Spawns an interactive child program with its standard input piped and its
//! standard output and standard error merged into a single readable pipe, so
//! that everything the child prints flows through one ordered byte stream.
//!
//! # Architecture
//!
//! - **ProcessConfig**: what to run, where, and with which environment
//! - **ProcessHandle**: the running child; line writes, liveness, termination

#![deny(unsafe_code)]
#![warn(missing_docs)]
//! - **OutputStream**: the receiving end of the merged stdout/stderr pipe
//! - **Error handling**: [`TransportError`] for spawn and pipe failures
//!
//! # Usage
//!
//! ```ignore
//! use clibridge_transport::{ProcessConfig, ProcessHandle};
//!
//! let config = ProcessConfig::new("./shm_cli").with_working_dir("/srv/shm");
//! let (mut handle, output) = ProcessHandle::spawn(&config).await?;
//! handle.write_line("show").await?;
//! ```

#[cfg(not(unix))]
compile_error!("clibridge-transport merges child output through a Unix pipe and requires a Unix target");

pub mod error;
pub mod process;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use process::{OutputStream, ProcessConfig, ProcessHandle};
