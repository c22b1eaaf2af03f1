//! Core session management
//!
//! Provides the ProcessSession struct, child launch and termination.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::lifecycle::{EventHandler, SessionEvent};
use crate::pump::{OutputPump, PumpSummary};
use crate::session::state::{Counters, SessionState, SessionStats, StartStatus};
use clibridge_transport::ProcessHandle;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How long shutdown waits for the pump to see end-of-stream
const PUMP_DRAIN_WAIT: Duration = Duration::from_millis(100);

/// An interactive child process with serialized command access
///
/// Construct one per child and share it by `Arc` between request handlers.
/// All access to the child's input and to the output queue goes through a
/// single async mutex (the command lock), so at most one command is in
/// flight and the pump is the only reader of the child's output.
pub struct ProcessSession {
    /// Configuration
    pub(crate) config: SessionConfig,

    /// Command lock guarding the live child
    pub(crate) live: Mutex<Option<LiveProcess>>,

    /// Diagnostics counters
    pub(crate) counters: Counters,

    /// Lifecycle callback
    pub(crate) on_event: Option<EventHandler>,
}

/// A launched child and the consuming side of its output queue
pub(crate) struct LiveProcess {
    pub(crate) handle: ProcessHandle,
    pub(crate) output: UnboundedReceiver<String>,
    pub(crate) pump: JoinHandle<PumpSummary>,
    exit_reported: bool,
}

impl Drop for LiveProcess {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("config", &self.config)
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl ProcessSession {
    /// Create a session; no child is launched until [`start`](Self::start)
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            live: Mutex::new(None),
            counters: Counters::default(),
            on_event: None,
        }
    }

    /// Create a session that reports lifecycle events to `on_event`
    ///
    /// The callback runs inline, sometimes while the command lock is held,
    /// so it must not call back into the session.
    pub fn new_with_lifecycle<F>(config: SessionConfig, on_event: F) -> Self
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        Self {
            on_event: Some(Arc::new(on_event)),
            ..Self::new(config)
        }
    }

    /// Launch the child unless one is already running
    ///
    /// Idempotent: with a live child this returns
    /// [`StartStatus::AlreadyRunning`] and spawns nothing. If the previous
    /// child has exited a new one is launched. Nothing is read from the child
    /// here; a start-up banner stays queued until the first command discards
    /// it.
    #[tracing::instrument(skip(self), fields(program = %self.config.program.display()))]
    pub async fn start(&self) -> Result<StartStatus> {
        let mut live = self.live.lock().await;

        if let Some(process) = live.as_mut() {
            if self.check_alive(process) {
                let pid = process.handle.pid();
                debug!(pid, "child already running");
                return Ok(StartStatus::AlreadyRunning { pid });
            }
            debug!(pid = process.handle.pid(), "previous child exited, relaunching");
        }

        let process = self.launch().await?;
        let pid = process.handle.pid();
        *live = Some(process);

        self.counters.record_launch();
        info!(pid, "child process started");
        self.emit(SessionEvent::Started {
            pid,
            program: self.config.program.display().to_string(),
        });

        Ok(StartStatus::Started { pid })
    }

    async fn launch(&self) -> Result<LiveProcess> {
        let (handle, output_stream) = ProcessHandle::spawn(&self.config.process_config())
            .await
            .map_err(SessionError::Spawn)?;

        let (sink, output) = mpsc::unbounded_channel();
        let pump = OutputPump::new(output_stream, &self.config.prompt, sink).spawn();

        Ok(LiveProcess {
            handle,
            output,
            pump,
            exit_reported: false,
        })
    }

    /// Terminate the child
    ///
    /// Closes its input, sends `SIGTERM`, and kills it after the configured
    /// grace period. Returns `None` if no child was ever started. The session
    /// is `Exited` afterwards and can be started again.
    pub async fn shutdown(&self) -> Result<Option<ExitStatus>> {
        let mut live = self.live.lock().await;
        let Some(process) = live.as_mut() else {
            return Ok(None);
        };

        let pid = process.handle.pid();
        let status = process.handle.terminate(self.config.shutdown_grace).await?;
        process.exit_reported = true;

        // Descendants that inherited the output pipe can keep it open.
        if tokio::time::timeout(PUMP_DRAIN_WAIT, &mut process.pump)
            .await
            .is_err()
        {
            debug!(pid, "output pump still attached, aborting");
            process.pump.abort();
        }

        info!(pid, ?status, "session shut down");
        self.emit(SessionEvent::Shutdown { pid });
        Ok(Some(status))
    }

    /// Current lifecycle state
    ///
    /// Waits for the command lock, so it returns after any in-flight command.
    pub async fn state(&self) -> SessionState {
        let mut live = self.live.lock().await;
        match live.as_mut() {
            None => SessionState::NotStarted,
            Some(process) => {
                if self.check_alive(process) {
                    SessionState::Running
                } else {
                    SessionState::Exited
                }
            }
        }
    }

    /// Process id of the current (or last) child
    pub async fn pid(&self) -> Option<u32> {
        self.live
            .lock()
            .await
            .as_ref()
            .map(|process| process.handle.pid())
    }

    /// Diagnostics counters
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot()
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Liveness check, reporting an observed exit once
    pub(crate) fn check_alive(&self, process: &mut LiveProcess) -> bool {
        match process.handle.exit_status() {
            None => true,
            Some(status) => {
                if !process.exit_reported {
                    process.exit_reported = true;
                    let pid = process.handle.pid();
                    info!(pid, ?status, "child process exited");
                    self.emit(SessionEvent::ChildExited {
                        pid,
                        code: status.code(),
                    });
                }
                false
            }
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(&event);
        }
    }
}
