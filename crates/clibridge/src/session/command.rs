//! Command protocol
//!
//! Each command runs entirely under the command lock:
//! 1. verify the child is alive (before any write)
//! 2. discard output queued since the previous command
//! 3. write the line and flush
//! 4. collect chunks until one ends with the prompt marker or the deadline
//!
//! A command that hits its deadline is not cancelled. Its output, if it ever
//! arrives, is discarded by the next command's drain step and shows up in
//! [`SessionStats::discarded_stale_chunks`](crate::SessionStats).

use crate::error::{Result, SessionError};
use crate::lifecycle::SessionEvent;
use crate::session::core::ProcessSession;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

impl ProcessSession {
    /// Send one command line and return the child's response
    ///
    /// Waits for the command lock, so concurrent callers are served one at a
    /// time and never see each other's output. The response is every chunk
    /// received after the write, up to and including the first chunk ending
    /// with the prompt marker.
    ///
    /// If the marker does not arrive within `timeout` this still returns
    /// `Ok` with whatever was collected, possibly an empty string. It also
    /// returns early if the child's output stream closes.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotRunning`] if no child was started or it has
    ///   exited; nothing is written in that case
    /// - [`SessionError::WriteFailure`] if writing or flushing the line fails
    #[tracing::instrument(
        skip(self, timeout),
        fields(timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    )]
    pub async fn send_command(&self, line: &str, timeout: Duration) -> Result<String> {
        let mut live = self.live.lock().await;

        let Some(process) = live.as_mut() else {
            return Err(SessionError::NotRunning);
        };
        if !self.check_alive(process) {
            return Err(SessionError::NotRunning);
        }
        let pid = process.handle.pid();

        let discarded = drain_stale(&mut process.output);
        if discarded > 0 {
            debug!(pid, chunks = discarded, "discarded stale output");
            self.counters.record_discarded(discarded);
            self.emit(SessionEvent::StaleOutputDiscarded {
                pid,
                chunks: discarded,
            });
        }

        process
            .handle
            .write_line(line)
            .await
            .map_err(SessionError::WriteFailure)?;
        self.counters.record_command();
        self.emit(SessionEvent::CommandSent {
            pid,
            command: line.to_string(),
        });

        // No deadline when the timeout is too large to represent.
        let deadline = Instant::now().checked_add(timeout);
        let prompt = self.config.prompt.as_str();
        let mut response = String::new();
        let mut complete = false;

        loop {
            let received = match deadline {
                Some(deadline) => timeout_at(deadline, process.output.recv()).await,
                None => Ok(process.output.recv().await),
            };
            match received {
                Ok(Some(chunk)) => {
                    response.push_str(&chunk);
                    if !prompt.is_empty() && chunk.ends_with(prompt) {
                        complete = true;
                        break;
                    }
                }
                Ok(None) => {
                    debug!(pid, "output stream closed while collecting");
                    break;
                }
                Err(_) => break,
            }
        }

        if !complete {
            warn!(
                pid,
                collected_bytes = response.len(),
                "no prompt before deadline, returning partial response"
            );
            self.counters.record_incomplete();
            self.emit(SessionEvent::ResponseIncomplete {
                pid,
                command: line.to_string(),
                collected_bytes: response.len(),
            });
        }

        Ok(response)
    }

    /// Send a command with the configured default timeout
    pub async fn send_command_default(&self, line: &str) -> Result<String> {
        self.send_command(line, self.config.command_timeout).await
    }
}

/// Remove every queued chunk without waiting for more
fn drain_stale(output: &mut UnboundedReceiver<String>) -> usize {
    let mut discarded = 0;
    while output.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::state::SessionState;
    use tokio::sync::mpsc;

    /// Answers every line with `ok <line>` and a prompt
    const ECHO_CLI: &str = r#"while IFS= read -r line; do
  printf 'ok %s\n> ' "$line"
done"#;

    fn session(script: &str) -> ProcessSession {
        ProcessSession::new(SessionConfig::new("sh").with_arg("-c").with_arg(script))
    }

    #[test]
    fn test_drain_stale_empties_queue() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("welcome\n".to_string()).unwrap();
        tx.send("> ".to_string()).unwrap();

        assert_eq!(drain_stale(&mut rx), 2);
        assert_eq!(drain_stale(&mut rx), 0);
    }

    #[tokio::test]
    async fn test_send_before_start_is_not_running() {
        let session = session(ECHO_CLI);
        let err = session
            .send_command("show", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotRunning));
        assert_eq!(session.stats().commands_sent, 0);
    }

    #[tokio::test]
    async fn test_response_ends_at_prompt() {
        let session = session(ECHO_CLI);
        session.start().await.unwrap();

        let output = session
            .send_command("show", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output, "ok show\n> ");

        let output = session
            .send_command_default("alloc 1 64")
            .await
            .unwrap();
        assert_eq!(output, "ok alloc 1 64\n> ");
        assert_eq!(session.stats().commands_sent, 2);
        assert_eq!(session.stats().incomplete_responses, 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_waits_for_prompt() {
        let session = session(ECHO_CLI);
        session.start().await.unwrap();

        let output = session.send_command("alloc 1", Duration::MAX).await.unwrap();
        assert_eq!(output, "ok alloc 1\n> ");
        assert_eq!(session.stats().incomplete_responses, 0);
    }

    #[tokio::test]
    async fn test_silent_child_returns_empty_after_timeout() {
        let session = session("while read line; do :; done");
        session.start().await.unwrap();

        let timeout = Duration::from_millis(200);
        let started = std::time::Instant::now();
        let output = session.send_command("show", timeout).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(output, "");
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(500), "took {:?}", elapsed);
        assert_eq!(session.stats().incomplete_responses, 1);
    }

    #[tokio::test]
    async fn test_exited_child_is_not_running() {
        let session = session("printf 'bye\n'");
        session.start().await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.state().await == SessionState::Running {
            assert!(Instant::now() < deadline, "child never exited");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = session
            .send_command("show", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotRunning));
        assert_eq!(session.stats().commands_sent, 0);
    }
}
