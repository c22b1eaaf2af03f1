//! Integration tests for the request-facing bridge

mod common;

use async_trait::async_trait;
use clibridge::{
    BinaryResolver, BootstrapConfig, BootstrapError, Bridge, BridgeConfig, FixedBinary,
    SessionError, StartState,
};
use common::{SHM_CLI, wait_until_exited, write_cli};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Resolver that takes a while, like a first-time compile
struct SlowBinary {
    path: PathBuf,
    delay: Duration,
}

#[async_trait]
impl BinaryResolver for SlowBinary {
    async fn resolve(&self) -> Result<PathBuf, BootstrapError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.path.clone())
    }
}

fn config(dir: &TempDir) -> BridgeConfig {
    BridgeConfig::new(BootstrapConfig::new(dir.path()))
        .with_startup_grace(Duration::from_millis(300))
        .with_command_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_start_locates_prebuilt_binary() {
    let dir = TempDir::new().unwrap();
    let binary = write_cli(dir.path(), "shm_cli", SHM_CLI)
        .canonicalize()
        .unwrap();
    let bridge = Bridge::new(config(&dir));

    let reply = bridge.start().await.unwrap();
    assert_eq!(reply.status, StartState::Started);
    assert_eq!(reply.binary, Some(binary));

    let reply = bridge.start().await.unwrap();
    assert_eq!(reply.status, StartState::AlreadyRunning);
    assert_eq!(reply.binary, None);
    assert_eq!(bridge.session().unwrap().stats().launches, 1);

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_command_round_trip() {
    let dir = TempDir::new().unwrap();
    let binary = write_cli(dir.path(), "fake_cli", SHM_CLI);
    let bridge = Bridge::with_resolver(config(&dir), Arc::new(FixedBinary(binary)));

    let before = bridge.command("alloc 10").await;
    assert!(!before.ok);
    assert_eq!(before.error.as_deref(), Some("CLI not started"));

    bridge.start().await.unwrap();

    let reply = bridge.command("  alloc 10\n").await;
    assert!(reply.ok, "{reply:?}");
    assert_eq!(reply.output.as_deref(), Some("ok addr=0x10\n> "));
    assert_eq!(reply.status_code(), 200);
    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        serde_json::json!({"ok": true, "output": "ok addr=0x10\n> "})
    );

    let empty = bridge.command("   ").await;
    assert!(!empty.ok);
    assert_eq!(empty.error.as_deref(), Some("cmd required"));
    assert_eq!(empty.status_code(), 400);

    // The banner was discarded by the first delivered command only.
    let stats = bridge.session().unwrap().stats();
    assert_eq!(stats.commands_sent, 1);
    assert_eq!(stats.discarded_stale_chunks, 2);
}

#[tokio::test]
async fn test_exited_child_reports_not_running_then_restarts() {
    let dir = TempDir::new().unwrap();
    let binary = write_cli(dir.path(), "fake_cli", SHM_CLI);
    let bridge = Bridge::with_resolver(config(&dir), Arc::new(FixedBinary(binary.clone())));

    bridge.start().await.unwrap();
    assert!(bridge.command("quit").await.ok);
    wait_until_exited(&bridge.session().unwrap()).await;

    let reply = bridge.command("alloc 1").await;
    assert!(!reply.ok);
    assert_eq!(
        reply.error.as_deref(),
        Some("CLI process is not running. Build and start the binary first.")
    );
    assert_eq!(reply.status_code(), 500);

    let restarted = bridge.start().await.unwrap();
    assert_eq!(restarted.status, StartState::Started);
    assert_eq!(restarted.binary, Some(binary));
    assert_eq!(
        bridge.command("alloc 1").await.output.as_deref(),
        Some("ok addr=0x1\n> ")
    );
}

#[tokio::test]
async fn test_bootstrap_failure_is_fatal() {
    let config = BridgeConfig::new(BootstrapConfig::new("/nonexistent/clibridge-root"));
    let bridge = Bridge::new(config);

    let err = bridge.start().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Bootstrap(BootstrapError::MissingRoot(_))
    ));
    assert!(bridge.session().is_none());
    assert!(!bridge.command("show").await.ok);
}

#[tokio::test]
async fn test_relative_root_starts_and_answers() {
    let dir = tempfile::Builder::new()
        .prefix("clibridge-rel-")
        .tempdir_in(".")
        .unwrap();
    assert!(dir.path().is_relative());
    write_cli(dir.path(), "shm_cli", SHM_CLI);

    let bridge = Bridge::new(
        BridgeConfig::new(BootstrapConfig::new(dir.path()))
            .with_startup_grace(Duration::from_millis(300))
            .with_command_timeout(Duration::from_secs(5)),
    );

    let reply = bridge.start().await.unwrap();
    assert_eq!(reply.status, StartState::Started);
    assert!(reply.binary.unwrap().is_absolute());
    assert_eq!(
        bridge.command("alloc 5").await.output.as_deref(),
        Some("ok addr=0x5\n> ")
    );

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_commands_do_not_wait_for_a_slow_start() {
    let dir = TempDir::new().unwrap();
    let binary = write_cli(dir.path(), "fake_cli", SHM_CLI);
    let bridge = Arc::new(Bridge::with_resolver(
        config(&dir),
        Arc::new(SlowBinary {
            path: binary,
            delay: Duration::from_millis(800),
        }),
    ));

    let starting = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.start().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let asked = Instant::now();
    let reply = bridge.command("alloc 1").await;
    assert!(asked.elapsed() < Duration::from_millis(300), "took {:?}", asked.elapsed());
    assert_eq!(reply.error.as_deref(), Some("CLI not started"));

    let started = starting.await.unwrap().unwrap();
    assert_eq!(started.status, StartState::Started);
    assert_eq!(
        bridge.command("alloc 1").await.output.as_deref(),
        Some("ok addr=0x1\n> ")
    );
}
