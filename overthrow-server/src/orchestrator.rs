//! Spawns bot subprocesses against a running relay and waits on them,
//! grounded in `examples/original_source/src/run_game.py`'s
//! `subprocess.Popen` fan-out of one server process plus N bot
//! processes, staggered slightly so the relay isn't hammered with
//! simultaneous connects.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};

const STAGGER: Duration = Duration::from_millis(50);
const BOT_BIN: &str = "bot";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("could not locate sibling binary {0:?}")]
    BinaryNotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn bot_binary_path() -> Result<PathBuf, OrchestratorError> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| OrchestratorError::BinaryNotFound(exe.clone()))?;
    let candidate = dir.join(BOT_BIN);
    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(OrchestratorError::BinaryNotFound(candidate))
    }
}

/// Launches `count` bot processes pointed at `relay_addr`, one
/// `STAGGER` apart, and returns their handles for the caller to await.
pub fn spawn_bots(relay_addr: SocketAddr, count: u8) -> Result<Vec<Child>, OrchestratorError> {
    let bin = bot_binary_path()?;
    let mut children = Vec::with_capacity(count as usize);
    for i in 1..=count {
        tracing::info!(bot = i, "spawning bot process");
        let child = Command::new(&bin)
            .arg("--address")
            .arg(relay_addr.ip().to_string())
            .arg("--port")
            .arg(relay_addr.port().to_string())
            .arg("--id")
            .arg(i.to_string())
            .arg("--kind")
            .arg("random")
            .spawn()?;
        children.push(child);
        std::thread::sleep(STAGGER);
    }
    Ok(children)
}

/// Waits for every spawned bot to exit, logging non-zero exits the
/// way `run_game.py` reports a failed bot process by index.
pub async fn wait_all(mut children: Vec<Child>) {
    for (i, child) in children.iter_mut().enumerate() {
        match child.wait().await {
            Ok(status) if !status.success() => {
                tracing::warn!(bot = i, %status, "bot process exited with an error");
            }
            Err(err) => {
                tracing::warn!(bot = i, %err, "failed to wait on bot process");
            }
            Ok(_) => {}
        }
    }
}
