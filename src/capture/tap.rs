//! Key event decoding
//!
//! Turns recorded key events into the characters they type, tracking
//! the third-level shift (AltGr) key across events since its state is
//! not part of the event mask.

use std::collections::HashSet;

use tracing::trace;

use super::{KeyEventKind, RawKeyEvent};
use crate::keyboard::{keysym_to_char, level3_shift_keysym, Keymap, ModifierState};

/// Decodes raw key events into characters
#[derive(Debug, Default)]
pub struct InputEventTap {
    level3_codes: HashSet<u8>,
    level3_held: bool,
}

impl InputEventTap {
    pub fn new(keymap: &Keymap) -> Self {
        let mut tap = Self::default();
        tap.update_layout(keymap);
        tap
    }

    /// Re-read which keycodes carry ISO_Level3_Shift
    pub fn update_layout(&mut self, keymap: &Keymap) {
        self.level3_codes = keymap
            .keycodes(level3_shift_keysym())
            .into_iter()
            .map(|key| key.code)
            .collect();
        trace!(codes = ?self.level3_codes, "third-level shift keycodes");
    }

    /// Whether AltGr is currently considered held
    ///
    /// A release lost to a grab leaves this stuck until the next release.
    #[cfg(test)]
    pub fn level3_held(&self) -> bool {
        self.level3_held
    }

    /// Character typed by `event`, if any
    pub fn handle(&mut self, event: RawKeyEvent, keymap: &Keymap) -> Option<char> {
        let is_level3 = self.level3_codes.contains(&event.code);
        match event.kind {
            KeyEventKind::Press => {
                if is_level3 {
                    self.level3_held = true;
                }
                let modifiers = ModifierState::from_mask(event.state, self.level3_held);
                let keysym = keymap.keysym(event.code, modifiers.index());
                keysym_to_char(keysym)
            }
            KeyEventKind::Release => {
                if is_level3 {
                    self.level3_held = false;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::fixtures::*;

    const SHIFT: u16 = 1;

    fn press(code: u8, state: u16) -> RawKeyEvent {
        RawKeyEvent {
            kind: KeyEventKind::Press,
            code,
            state,
        }
    }

    fn release(code: u8, state: u16) -> RawKeyEvent {
        RawKeyEvent {
            kind: KeyEventKind::Release,
            code,
            state,
        }
    }

    #[test]
    fn test_plain_and_shifted_letters() {
        let keymap = us_layout();
        let mut tap = InputEventTap::new(&keymap);
        assert_eq!(tap.handle(press(letter_code('a'), 0), &keymap), Some('a'));
        assert_eq!(tap.handle(press(letter_code('a'), SHIFT), &keymap), Some('A'));
        assert_eq!(tap.handle(press(CODE_SLASH, 0), &keymap), Some('/'));
        assert_eq!(tap.handle(press(CODE_SLASH, SHIFT), &keymap), Some('?'));
    }

    #[test]
    fn test_releases_and_modifiers_produce_nothing() {
        let keymap = us_layout();
        let mut tap = InputEventTap::new(&keymap);
        assert_eq!(tap.handle(release(letter_code('a'), 0), &keymap), None);
        assert_eq!(tap.handle(press(CODE_SHIFT, 0), &keymap), None);
    }

    #[test]
    fn test_backspace_and_return() {
        let keymap = us_layout();
        let mut tap = InputEventTap::new(&keymap);
        assert_eq!(tap.handle(press(CODE_BACKSPACE, 0), &keymap), Some('\x08'));
        assert_eq!(tap.handle(press(CODE_RETURN, 0), &keymap), Some('\r'));
    }

    #[test]
    fn test_altgr_is_tracked_across_events() {
        let keymap = us_layout();
        let mut tap = InputEventTap::new(&keymap);
        let e = letter_code('e');

        assert_eq!(tap.handle(press(CODE_LEVEL3, 0), &keymap), None);
        assert!(tap.level3_held());
        assert_eq!(tap.handle(press(e, 0), &keymap), Some('é'));
        assert_eq!(tap.handle(press(e, SHIFT), &keymap), Some('É'));

        tap.handle(release(CODE_LEVEL3, 0), &keymap);
        assert!(!tap.level3_held());
        assert_eq!(tap.handle(press(e, 0), &keymap), Some('e'));
    }

    #[test]
    fn test_lost_altgr_release_stays_held() {
        let keymap = us_layout();
        let mut tap = InputEventTap::new(&keymap);
        tap.handle(press(CODE_LEVEL3, 0), &keymap);
        // Release of some other key does not clear AltGr
        tap.handle(release(letter_code('x'), 0), &keymap);
        assert!(tap.level3_held());
        // Letters without an AltGr column type nothing while stuck
        assert_eq!(tap.handle(press(letter_code('a'), 0), &keymap), None);
    }

    #[test]
    fn test_altgr_unicode_keysym_is_decoded() {
        // Keycode 8 is AltGr, keycode 9 types U00E9 on its third level
        let keymap = Keymap::new(
            8,
            5,
            vec![
                level3_shift_keysym(), 0, 0, 0, 0,
                u32::from('e'), u32::from('E'), 0, 0, 0x0100_00E9,
            ],
        );
        let mut tap = InputEventTap::new(&keymap);
        tap.handle(press(8, 0), &keymap);
        assert_eq!(tap.handle(press(9, 0), &keymap), Some('é'));
    }

    #[test]
    fn test_update_layout_refreshes_altgr_codes() {
        let keymap = us_layout();
        let mut tap = InputEventTap::new(&Keymap::default());
        tap.handle(press(CODE_LEVEL3, 0), &keymap);
        assert!(!tap.level3_held());

        tap.update_layout(&keymap);
        tap.handle(press(CODE_LEVEL3, 0), &keymap);
        assert!(tap.level3_held());
    }
}
