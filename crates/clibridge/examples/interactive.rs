//! Interactive shell over a bridged CLI
//!
//! Starts the CLI found (or built) in `CLIBRIDGE_ROOT` and forwards each line
//! typed on standard input as one command, printing the collected response.
//!
//! ## Usage
//!
//! ```bash
//! # Use a prebuilt shm_cli in the given project directory
//! CLIBRIDGE_ROOT=/srv/shm cargo run -p clibridge --example interactive
//!
//! # Longer per-command timeout and verbose session logs
//! CLIBRIDGE_TIMEOUT_MS=5000 RUST_LOG=clibridge=debug \
//!     cargo run -p clibridge --example interactive
//! ```

use clibridge::{Bridge, BridgeConfig, ErrorRecovery};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clibridge=info")),
        )
        .init();

    let bridge = Bridge::new(BridgeConfig::from_env());

    match bridge.start().await {
        Ok(reply) => println!("{}", serde_json::to_string(&reply)?),
        Err(err) => {
            eprintln!("start failed: {err}");
            eprintln!("hint: {}", err.suggested_action());
            return Err(err.into());
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "exit" {
            break;
        }

        let reply = bridge.command(&line).await;
        match (&reply.output, &reply.error) {
            (Some(output), _) => {
                print!("{output}");
                std::io::stdout().flush()?;
            }
            (None, Some(error)) => eprintln!("error ({}): {error}", reply.status_code()),
            (None, None) => {}
        }
    }

    bridge.shutdown().await?;
    Ok(())
}
