//! Process management for interactive child programs

use crate::error::{Result, TransportError};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::unix::pipe;
use tokio::process::{Child, ChildStdin, Command};

/// Receiving end of the child's merged stdout/stderr pipe
pub type OutputStream = pipe::Receiver;

/// Configuration for spawning an interactive child process
#[derive(Clone, Debug, Default)]
pub struct ProcessConfig {
    /// Path to the executable
    pub program: PathBuf,

    /// Arguments to pass to the program
    pub args: Vec<String>,

    /// Environment variables to set
    pub env: HashMap<String, String>,

    /// Start the child with an empty environment
    pub clear_env: bool,

    /// Working directory of the child
    pub working_dir: Option<PathBuf>,
}

impl ProcessConfig {
    /// Create a new process configuration
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Clear the inherited environment
    ///
    /// # Security Note
    ///
    /// When enabled, only the variables explicitly set with
    /// [`ProcessConfig::with_env`] reach the child.
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Handle to a running child process
///
/// Owns the child and its input pipe. The output pipe is handed back
/// separately from [`ProcessHandle::spawn`] so it can be moved to a reader task.
pub struct ProcessHandle {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    pid: u32,
    program: PathBuf,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("program", &self.program)
            .field("stdin_open", &self.stdin.is_some())
            .finish()
    }
}

impl ProcessHandle {
    /// Spawn a new child process
    ///
    /// Standard output and standard error share the write end of one pipe,
    /// so diagnostics are interleaved with regular output in the order the
    /// child wrote them. The child is killed if the handle is dropped.
    pub async fn spawn(config: &ProcessConfig) -> Result<(Self, OutputStream)> {
        let (reader, writer) = std::io::pipe()
            .map_err(|e| TransportError::Spawn(format!("Failed to create output pipe: {}", e)))?;
        let stderr_writer = writer
            .try_clone()
            .map_err(|e| TransportError::Spawn(format!("Failed to clone output pipe: {}", e)))?;

        // The command owns the parent's copies of the write end. It must be
        // dropped right after spawning or the reader never sees end-of-file.
        let mut child = {
            let mut cmd = Command::new(&config.program);
            cmd.args(&config.args);

            if config.clear_env {
                cmd.env_clear();
            }
            for (key, value) in &config.env {
                cmd.env(key, value);
            }
            if let Some(dir) = &config.working_dir {
                cmd.current_dir(dir);
            }

            cmd.stdin(Stdio::piped());
            cmd.stdout(writer);
            cmd.stderr(stderr_writer);
            cmd.kill_on_drop(true);

            cmd.spawn().map_err(|e| {
                TransportError::Spawn(format!(
                    "Failed to spawn {}: {}",
                    config.program.display(),
                    e
                ))
            })?
        };

        let pid = child
            .id()
            .ok_or_else(|| TransportError::Process("Spawned child has no pid".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Process("Failed to get stdin".to_string()))?;
        let output = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;

        tracing::debug!(pid, program = %config.program.display(), "spawned child process");

        Ok((
            Self {
                child,
                stdin: Some(BufWriter::new(stdin)),
                pid,
                program: config.program.clone(),
            },
            output,
        ))
    }

    /// Write one line to the child's input and flush it
    ///
    /// A trailing newline is appended to `line`.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;

        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    /// Exit status if the child has already exited
    ///
    /// Errors from the underlying wait are treated as "still running".
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Check if the child is still alive
    pub fn is_alive(&mut self) -> bool {
        self.exit_status().is_none()
    }

    /// Terminate the child
    ///
    /// Closes the child's input, sends `SIGTERM` and waits up to `grace` for
    /// the child to exit before killing it.
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitStatus> {
        // EOF on stdin lets line-driven programs leave their read loop cleanly.
        self.stdin.take();

        if let Some(status) = self.exit_status() {
            return Ok(status);
        }

        let raw_pid = i32::try_from(self.pid)
            .map_err(|_| TransportError::Process(format!("Pid {} out of range", self.pid)))?;
        if let Err(e) = kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
            tracing::warn!(pid = self.pid, "Failed to send SIGTERM: {}", e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                tracing::warn!(pid = self.pid, ?grace, "child ignored SIGTERM, killing");
                self.child
                    .kill()
                    .await
                    .map_err(|e| TransportError::Process(format!("Failed to kill process: {}", e)))?;
                Ok(self.child.wait().await?)
            }
        }
    }

    /// OS process id of the child
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Program the child was spawned from
    pub fn program(&self) -> &Path {
        &self.program
    }
}
