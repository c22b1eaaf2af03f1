//! Shared helpers for clibridge integration tests
//!
//! The child programs are small POSIX shell scripts that mimic an allocator
//! shell: a banner, a `> ` prompt after every response, and a few commands
//! with deliberately awkward timing.

#![allow(dead_code)]

use clibridge::{ProcessSession, SessionConfig, SessionState};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Allocator-shell stand-in
///
/// - `alloc <n>` answers `ok addr=0x<n>`
/// - `slow <x>` sleeps one second before answering `late`
/// - `warn <x>` writes `warning` to stderr, then `done` to stdout
/// - `quit` exits without a prompt
/// - anything else is echoed back
pub const SHM_CLI: &str = r#"printf 'welcome\n> '
while IFS= read -r line; do
  case "$line" in
    "alloc "*) printf 'ok addr=0x%s\n> ' "${line#alloc }" ;;
    "slow "*) sleep 1; printf 'late\n> ' ;;
    "warn "*) printf 'warning\n' >&2; printf 'done\n> ' ;;
    quit) exit 0 ;;
    *) printf 'echo %s\n> ' "$line" ;;
  esac
done"#;

/// Session config running `script` under `sh -c`
pub fn sh_config(script: &str) -> SessionConfig {
    SessionConfig::new("sh").with_arg("-c").with_arg(script)
}

/// Write `script` as an executable file named `name` in `dir`
pub fn write_cli(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Poll until the session's child has exited
pub async fn wait_until_exited(session: &ProcessSession) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while session.state().await != SessionState::Exited {
        assert!(
            tokio::time::Instant::now() < deadline,
            "child did not exit in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Start the session and give the banner time to be queued
pub async fn start_settled(session: &ProcessSession) -> clibridge::StartStatus {
    let status = session.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    status
}
