//! Capture module for global keyboard event listening
//!
//! Uses the X11 RECORD extension to observe every key press and release
//! in the display session, and decodes them into typed characters.

mod record;
mod tap;

pub use record::RecordCapture;
pub use tap::InputEventTap;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;
use x11rb::errors::{ConnectError, ConnectionError, ParseError, ReplyError, ReplyOrIdError};

use crate::keyboard::Keyboard;

/// Whether a key went down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Press,
    Release,
}

/// A hardware key event as recorded from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub kind: KeyEventKind,
    /// Physical keycode
    pub code: u8,
    /// Modifier and button mask at the time of the event
    pub state: u16,
}

/// Events delivered by a [`CaptureSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    Key(RawKeyEvent),
    /// The keyboard mapping changed; cached keymaps are stale
    LayoutChanged,
}

/// A session-wide keyboard event subscription
pub trait CaptureSource {
    type Keyboard: Keyboard;

    /// Keyboard for layout queries and injection on the same display
    fn keyboard(&self) -> Self::Keyboard;

    /// Handle that tears the subscription down from another thread
    fn stop_handle(&self) -> StopHandle;

    /// Deliver events to `handler` until stopped
    ///
    /// Blocks the calling thread.
    fn run(&mut self, handler: &mut dyn FnMut(CaptureEvent)) -> Result<(), CaptureError>;

    /// Release the subscription and display handles
    fn cleanup(&mut self);
}

/// Use-once teardown guard shared between the capture thread and its host
///
/// The first call to [`StopHandle::stop`] runs the teardown action, any
/// later call from any thread is a no-op.
#[derive(Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    teardown: Arc<dyn Fn() + Send + Sync>,
}

impl StopHandle {
    pub fn new(teardown: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            teardown: Arc::new(teardown),
        }
    }

    /// Stop the capture; returns `false` if it was already stopped
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("capture already stopped");
            return false;
        }
        (self.teardown)();
        true
    }

    /// Check if stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Errors that can occur while setting up or running the capture
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to connect to the X display: {0}")]
    Connect(#[from] ConnectError),

    #[error("global key capture is unavailable: {0}")]
    Unavailable(String),

    #[error("display connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("display request failed: {0}")]
    Reply(#[from] ReplyError),

    #[error("failed to allocate a record context: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),

    #[error("malformed recorded data: {0}")]
    Parse(#[from] ParseError),
}
