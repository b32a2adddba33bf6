//! Bounded join of blocking worker threads

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::oneshot;
use tracing::warn;

/// Wait up to `limit` for `handle` to finish
///
/// Returns `Ok(false)` when the thread is still running after `limit`.
/// The join happens on a detached helper thread rather than the blocking
/// pool, so an abandoned thread cannot hold up runtime shutdown.
pub async fn join_thread(handle: JoinHandle<()>, limit: Duration) -> Result<bool> {
    let name = handle.thread().name().unwrap_or("unnamed").to_string();
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name(format!("{name}-join"))
        .spawn(move || {
            let _ = tx.send(handle.join().is_ok());
        })
        .context("failed to spawn join thread")?;

    match tokio::time::timeout(limit, rx).await {
        Ok(joined) => {
            if !joined.context("join thread vanished")? {
                return Err(anyhow!("thread {name} panicked"));
            }
            Ok(true)
        }
        Err(_) => {
            warn!(thread = %name, ?limit, "thread did not stop in time, abandoning it");
            Ok(false)
        }
    }
}
