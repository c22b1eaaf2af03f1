//! Request-handler facing API
//!
//! A [`Bridge`] is what a web handler holds: it creates the session lazily on
//! the first start request, validates command text, and turns outcomes into
//! serializable replies. A failed command (`ok: false`) stays distinguishable
//! from a command that timed out while the child is still running, which
//! replies `ok: true` with partial or empty output.

use crate::bootstrap::{BinaryResolver, Bootstrap};
use crate::config::BridgeConfig;
use crate::error::{Result, SessionError};
use crate::session::{ProcessSession, StartStatus};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Status reported by [`Bridge::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartState {
    /// A child was launched by this call
    Started,
    /// The session was already running
    AlreadyRunning,
}

/// Reply to a start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartReply {
    /// Whether this call launched the child
    pub status: StartState,

    /// Executable that was launched, when this call launched it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
}

/// Reply to a command request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    /// Whether the command was delivered
    pub ok: bool,

    /// Output collected for the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip)]
    status_code: u16,
}

impl CommandReply {
    fn success(output: String) -> Self {
        Self {
            ok: true,
            output: Some(output),
            error: None,
            status_code: 200,
        }
    }

    fn failure(err: &SessionError) -> Self {
        let status_code = match err {
            SessionError::NotStarted | SessionError::EmptyCommand => 400,
            _ => 500,
        };
        Self {
            ok: false,
            output: None,
            error: Some(err.to_string()),
            status_code,
        }
    }

    /// HTTP status a handler should answer with
    ///
    /// `400` for requests that can never succeed as sent, `500` for session
    /// failures, `200` otherwise.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }
}

/// Lazily started, shareable front door to one session
pub struct Bridge {
    config: BridgeConfig,
    resolver: Arc<dyn BinaryResolver>,
    session: OnceCell<Arc<ProcessSession>>,
}

impl Bridge {
    /// Create a bridge that locates or builds the executable on first start
    pub fn new(config: BridgeConfig) -> Self {
        let resolver = Arc::new(Bootstrap::new(config.bootstrap.clone()));
        Self::with_resolver(config, resolver)
    }

    /// Create a bridge with a custom executable resolver
    pub fn with_resolver(config: BridgeConfig, resolver: Arc<dyn BinaryResolver>) -> Self {
        Self {
            config,
            resolver,
            session: OnceCell::new(),
        }
    }

    /// Start the session if it is not running
    ///
    /// The first call resolves the executable (a failure is fatal and
    /// surfaced as [`SessionError::Bootstrap`]), launches it and waits the
    /// start-up grace period so the banner is queued before any command.
    /// Later calls reply `already_running`; if the child has exited in the
    /// meantime it is relaunched and the reply is `started`.
    pub async fn start(&self) -> Result<StartReply> {
        // Concurrent first starts wait for one resolution; commands never wait.
        let session = self
            .session
            .get_or_try_init(|| async {
                let binary = self.resolver.resolve().await?;
                info!(binary = %binary.display(), "creating CLI session");
                Ok::<_, SessionError>(Arc::new(ProcessSession::new(
                    self.config.session_config(binary),
                )))
            })
            .await?;

        let status = session.start().await?;
        match status {
            StartStatus::Started { .. } => {
                tokio::time::sleep(self.config.startup_grace).await;
                Ok(StartReply {
                    status: StartState::Started,
                    binary: Some(session.config().program.clone()),
                })
            }
            StartStatus::AlreadyRunning { .. } => Ok(StartReply {
                status: StartState::AlreadyRunning,
                binary: None,
            }),
        }
    }

    /// Send command text, trimmed, to the session
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotStarted`] before the first successful `start`
    /// - [`SessionError::EmptyCommand`] if the text is blank
    /// - any error from [`ProcessSession::send_command`]
    pub async fn try_command(&self, text: &str) -> Result<String> {
        let session = self.session.get().ok_or(SessionError::NotStarted)?;

        let command = text.trim();
        if command.is_empty() {
            return Err(SessionError::EmptyCommand);
        }

        session
            .send_command(command, self.config.command_timeout)
            .await
    }

    /// Send command text and wrap the outcome in a reply
    pub async fn command(&self, text: &str) -> CommandReply {
        match self.try_command(text).await {
            Ok(output) => CommandReply::success(output),
            Err(err) => CommandReply::failure(&err),
        }
    }

    /// The session, once created by [`start`](Self::start)
    pub fn session(&self) -> Option<Arc<ProcessSession>> {
        self.session.get().cloned()
    }

    /// Terminate the child, if any
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(session) = self.session.get() {
            session.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_reply_json() {
        let reply = CommandReply::success("ok\n> ".to_string());
        let json = serde_json::to_value(&reply).unwrap();

        assert_eq!(json, serde_json::json!({"ok": true, "output": "ok\n> "}));
        assert_eq!(reply.status_code(), 200);
    }

    #[test]
    fn test_failure_reply_json() {
        let reply = CommandReply::failure(&SessionError::EmptyCommand);
        let json = serde_json::to_value(&reply).unwrap();

        assert_eq!(json, serde_json::json!({"ok": false, "error": "cmd required"}));
        assert_eq!(reply.status_code(), 400);

        let reply = CommandReply::failure(&SessionError::NotRunning);
        assert_eq!(reply.status_code(), 500);
    }

    #[test]
    fn test_start_reply_json() {
        let reply = StartReply {
            status: StartState::AlreadyRunning,
            binary: None,
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({"status": "already_running"})
        );

        let reply = StartReply {
            status: StartState::Started,
            binary: Some(PathBuf::from("/srv/shm/shm_cli")),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({"status": "started", "binary": "/srv/shm/shm_cli"})
        );
    }

    #[tokio::test]
    async fn test_command_before_start() {
        let bridge = Bridge::new(BridgeConfig::default());
        let reply = bridge.command("show").await;

        assert!(!reply.ok);
        assert_eq!(reply.error.as_deref(), Some("CLI not started"));
        assert_eq!(reply.status_code(), 400);
    }
}
