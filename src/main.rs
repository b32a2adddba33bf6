//! chotu-daemon: Background hotstring expansion daemon for X11 desktops
//!
//! This daemon runs in the user's X session and provides:
//! - Global key capture via the X11 RECORD extension
//! - Rolling-buffer matching of typed abbreviations against a hotstring table
//! - Synthetic key injection of the expansion into the focused window
//!
//! Scope:
//! - Capture, matching and injection run on one dedicated thread
//! - The main task only waits for shutdown signals and tears the capture down
//! - NO tray icon or menu; those belong to a separate front end

mod capture;
mod config;
mod hotstring;
mod keyboard;
mod lifecycle;

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::RecordCapture;
use crate::config::Config;
use crate::hotstring::HotstringEngine;
use crate::lifecycle::{join_thread, ShutdownSignal};

/// How long to wait for the capture thread after stopping it
const CAPTURE_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "chotu-daemon starting"
    );

    // Load configuration and the hotstring table
    let config = Config::load()?;
    info!(
        ?config.config_dir,
        ?config.table_path,
        policy = %config.match_policy,
        "configuration loaded"
    );
    let table = config.load_table()?;

    // Both are fatal: without a global event tap there is nothing to do
    let capture = RecordCapture::connect(config.display.as_deref())
        .context("failed to start global key capture")?;
    let engine = HotstringEngine::new(table, config.match_policy, capture)?;
    let stop = engine.stop_handle();

    let shutdown = ShutdownSignal::new();

    // Run the engine on its own thread; it blocks inside the record loop
    let (done_tx, done_rx) = oneshot::channel();
    let capture_thread = thread::Builder::new()
        .name("hotstring-capture".to_string())
        .spawn(move || {
            info!("capture thread started");
            let result = engine.start();
            if done_tx.send(result).is_err() {
                warn!("main task is gone, capture result dropped");
            }
        })
        .context("failed to spawn capture thread")?;

    info!("daemon initialized, waiting for hotstrings");

    let outcome: Result<()> = tokio::select! {
        // Wait for shutdown signal
        result = shutdown.wait() => match result {
            Ok(signal) => {
                info!(signal, "shutdown signal received");
                Ok(())
            }
            Err(e) => Err(anyhow!(e).context("failed to listen for shutdown signals")),
        },

        // The capture loop ended on its own
        result = done_rx => match result {
            Ok(Ok(())) => {
                warn!("capture thread exited");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(%e, "capture thread failed");
                Err(e.into())
            }
            Err(_) => Err(anyhow!("capture thread ended without reporting a result")),
        },
    };

    // Cleanup
    info!("shutting down...");

    stop.stop();
    join_thread(capture_thread, CAPTURE_STOP_TIMEOUT).await?;

    info!("chotu-daemon stopped");

    outcome
}
