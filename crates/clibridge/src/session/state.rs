//! Session state and diagnostics counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of a session
///
/// `NotStarted → Running → Exited`. A session never returns to `NotStarted`;
/// calling `start()` on an exited session launches a fresh child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// `start()` has not launched a child yet
    NotStarted,
    /// The child is alive
    Running,
    /// The child has exited on its own or was shut down
    Exited,
}

/// Outcome of `start()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    /// A new child was launched
    Started {
        /// OS process id
        pid: u32,
    },
    /// A live child already existed; nothing was spawned
    AlreadyRunning {
        /// OS process id of the existing child
        pid: u32,
    },
}

impl StartStatus {
    /// Process id of the running child
    pub fn pid(&self) -> u32 {
        match self {
            Self::Started { pid } | Self::AlreadyRunning { pid } => *pid,
        }
    }

    /// Whether this call launched the child
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Snapshot of session diagnostics
///
/// `discarded_stale_chunks` makes the drain-before-send contract visible:
/// output the child produced between commands, including late output of a
/// timed-out command, is dropped and counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Child processes launched by this session
    pub launches: u64,

    /// Commands written to the child
    pub commands_sent: u64,

    /// Commands that returned without the prompt marker
    pub incomplete_responses: u64,

    /// Queued chunks discarded before sending a command
    pub discarded_stale_chunks: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    launches: AtomicU64,
    commands_sent: AtomicU64,
    incomplete_responses: AtomicU64,
    discarded_stale_chunks: AtomicU64,
}

impl Counters {
    pub(crate) fn record_launch(&self) {
        self.launches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_command(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_incomplete(&self) {
        self.incomplete_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, chunks: usize) {
        self.discarded_stale_chunks
            .fetch_add(chunks as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            launches: self.launches.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            incomplete_responses: self.incomplete_responses.load(Ordering::Relaxed),
            discarded_stale_chunks: self.discarded_stale_chunks.load(Ordering::Relaxed),
        }
    }
}
