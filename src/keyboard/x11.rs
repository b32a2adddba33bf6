//! X11 keyboard backend
//!
//! Reads the core keyboard mapping and delivers synthetic key events to
//! the focused window with SendEvent.

use std::sync::Arc;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt as _, EventMask, InputFocus, KeyButMask, KeyPressEvent, Window,
    KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
};
use x11rb::rust_connection::RustConnection;
use x11rb::{CURRENT_TIME, NONE};

use super::{KeyCode, Keyboard, KeyboardError, Keymap};

/// Keyboard bound to one X11 connection and screen
pub struct X11Keyboard {
    conn: Arc<RustConnection>,
    root: Window,
    target: Window,
}

impl X11Keyboard {
    /// Create a keyboard on `conn`, using the root window of `screen`
    pub fn new(conn: Arc<RustConnection>, screen: usize) -> Self {
        let root = conn
            .setup()
            .roots
            .get(screen)
            .or_else(|| conn.setup().roots.first())
            .map(|s| s.root)
            .unwrap_or(NONE);
        Self {
            conn,
            root,
            target: root,
        }
    }

    fn key_event(&self, response_type: u8, key: KeyCode) -> KeyPressEvent {
        KeyPressEvent {
            response_type,
            detail: key.code,
            sequence: 0,
            time: CURRENT_TIME,
            root: self.root,
            event: self.target,
            child: NONE,
            root_x: 0,
            root_y: 0,
            event_x: 0,
            event_y: 0,
            state: KeyButMask::from(key.state_mask()),
            same_screen: true,
        }
    }
}

impl Keyboard for X11Keyboard {
    fn keymap(&mut self) -> Result<Keymap, KeyboardError> {
        let setup = self.conn.setup();
        let min = setup.min_keycode;
        let count = setup.max_keycode.saturating_sub(min).saturating_add(1);
        let reply = self.conn.get_keyboard_mapping(min, count)?.reply()?;
        debug!(
            min_keycode = min,
            keysyms_per_keycode = reply.keysyms_per_keycode,
            "keyboard mapping fetched"
        );
        Ok(Keymap::new(min, reply.keysyms_per_keycode, reply.keysyms))
    }

    fn focus(&mut self) -> Result<(), KeyboardError> {
        let focus = self.conn.get_input_focus()?.reply()?.focus;
        self.target = if focus == u32::from(InputFocus::NONE)
            || focus == u32::from(InputFocus::POINTER_ROOT)
        {
            warn!(focus, "no focused window, sending keys to the root window");
            self.root
        } else {
            focus
        };
        Ok(())
    }

    fn send(&mut self, key: KeyCode) -> Result<(), KeyboardError> {
        let press = self.key_event(KEY_PRESS_EVENT, key);
        let release = self.key_event(KEY_RELEASE_EVENT, key);
        self.conn
            .send_event(false, self.target, EventMask::NO_EVENT, press)?;
        self.conn
            .send_event(false, self.target, EventMask::NO_EVENT, release)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), KeyboardError> {
        self.conn.flush()?;
        Ok(())
    }
}
