//! Keyboard module for layout queries and synthetic input
//!
//! Resolves characters against the active X11 keyboard mapping and
//! types expansions into the focused window.

mod keymap;
mod modifiers;
mod synth;
mod x11;

pub use keymap::{keysym_to_char, level3_shift_keysym, KeyCode, Keymap};
pub use modifiers::ModifierState;
pub use synth::{KeySynthesizer, BACKSPACE};
pub use x11::X11Keyboard;

#[cfg(test)]
pub(crate) use keymap::fixtures;
#[cfg(test)]
pub(crate) use synth::testing;

use x11rb::errors::{ConnectionError, ReplyError};

/// Layout lookup and synthetic key delivery for the display session
///
/// Implementations are used only from the capture thread.
pub trait Keyboard {
    /// Fetch the current keyboard mapping
    fn keymap(&mut self) -> Result<Keymap, KeyboardError>;

    /// Pick the window that receives the following keys
    fn focus(&mut self) -> Result<(), KeyboardError>;

    /// Queue a press/release pair for `key`
    fn send(&mut self, key: KeyCode) -> Result<(), KeyboardError>;

    /// Force delivery of all queued keys
    fn flush(&mut self) -> Result<(), KeyboardError>;
}

/// Errors that can occur while resolving or injecting keys
#[derive(Debug, thiserror::Error)]
pub enum KeyboardError {
    #[error("no keycode for {0:?} under the current layout")]
    UnresolvedCharacter(char),

    #[error("display connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("display request failed: {0}")]
    Reply(#[from] ReplyError),
}
