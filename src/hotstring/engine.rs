//! Hotstring engine: capture → match → expand
//!
//! Everything runs synchronously inside the capture callback on the
//! thread that calls [`HotstringEngine::start`]. The buffer, AltGr state
//! and keymap are only ever touched from that thread.

use tracing::{info, warn};

use super::buffer::{MatchPolicy, Matcher};
use super::table::PatternTable;
use crate::capture::{CaptureError, CaptureEvent, CaptureSource, InputEventTap, StopHandle};
use crate::keyboard::{KeySynthesizer, Keyboard, KeyboardError};

/// Errors that can occur while creating or running the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("hotstring table is empty")]
    EmptyTable,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("failed to read the keyboard layout: {0}")]
    Keyboard(#[from] KeyboardError),
}

/// Watches typed input and replaces hotstrings as they are completed
pub struct HotstringEngine<C: CaptureSource> {
    capture: C,
    matcher: Matcher,
}

impl<C: CaptureSource> HotstringEngine<C> {
    /// Create an engine over `capture`
    ///
    /// Fails with [`EngineError::EmptyTable`] when `table` has no entries.
    pub fn new(table: PatternTable, policy: MatchPolicy, capture: C) -> Result<Self, EngineError> {
        if table.is_empty() {
            return Err(EngineError::EmptyTable);
        }
        info!(
            patterns = table.len(),
            buffer_capacity = table.max_pattern_len(),
            %policy,
            "hotstring engine created"
        );
        Ok(Self {
            capture,
            matcher: Matcher::new(table, policy),
        })
    }

    /// Handle for stopping the engine from another thread
    ///
    /// [`StopHandle::stop`] releases the capture subscription and makes
    /// [`HotstringEngine::start`] return; a second call does nothing.
    pub fn stop_handle(&self) -> StopHandle {
        self.capture.stop_handle()
    }

    /// Run the capture loop until stopped
    ///
    /// Blocks the calling thread. The capture subscription is released
    /// before returning, whether the loop ended normally or not.
    pub fn start(self) -> Result<(), EngineError> {
        let Self {
            mut capture,
            mut matcher,
        } = self;
        let result = run_pipeline(&mut capture, &mut matcher);
        capture.cleanup();
        info!("hotstring engine stopped");
        result
    }
}

fn run_pipeline<C: CaptureSource>(capture: &mut C, matcher: &mut Matcher) -> Result<(), EngineError> {
    let mut synth = KeySynthesizer::new(capture.keyboard());
    let mut keymap = synth.keyboard_mut().keymap()?;
    let mut tap = InputEventTap::new(&keymap);
    let mut layout_stale = false;

    info!("hotstring engine running");

    capture.run(&mut |event| match event {
        CaptureEvent::LayoutChanged => layout_stale = true,
        CaptureEvent::Key(key) => {
            if layout_stale {
                match synth.keyboard_mut().keymap() {
                    Ok(fresh) => {
                        tap.update_layout(&fresh);
                        keymap = fresh;
                        layout_stale = false;
                        info!("keyboard layout reloaded");
                    }
                    Err(e) => warn!(%e, "failed to reload keyboard layout, keeping the old one"),
                }
            }

            let Some(ch) = tap.handle(key, &keymap) else {
                return;
            };
            let Some(expansion) = matcher.feed(ch) else {
                return;
            };

            match synth.expand(&keymap, expansion.pattern_len, &expansion.text) {
                Ok(report) => info!(
                    pattern = %expansion.pattern,
                    backspaces = report.backspaces,
                    typed = report.typed,
                    skipped = report.skipped,
                    "hotstring expanded"
                ),
                Err(e) => warn!(%e, pattern = %expansion.pattern, "hotstring expansion failed"),
            }
        }
    })?;

    Ok(())
}
