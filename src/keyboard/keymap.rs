//! Snapshot of the active keyboard layout
//!
//! Maps keycodes plus a modifier index to keysyms and back, and converts
//! between keysyms and the characters they type.

use xkeysym::Keysym;

use super::modifiers::index_to_mask;

/// Keysym value meaning "no symbol bound"
pub const NO_SYMBOL: u32 = 0;

/// Offset of the direct Unicode keysym range
const UNICODE_KEYSYM_BASE: u32 = 0x0100_0000;

/// Function keys whose keysym carries an ASCII control code in its low byte
const CONTROL_KEYSYMS: [Keysym; 10] = [
    Keysym::BackSpace,
    Keysym::Tab,
    Keysym::Linefeed,
    Keysym::Clear,
    Keysym::Return,
    Keysym::Pause,
    Keysym::Scroll_Lock,
    Keysym::Sys_Req,
    Keysym::Escape,
    Keysym::Delete,
];

/// A key that can be injected: physical keycode plus the modifier index
/// needed to produce the wanted symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode {
    pub code: u8,
    pub index: u8,
}

impl KeyCode {
    /// Event state mask to send along with this key
    pub fn state_mask(&self) -> u16 {
        index_to_mask(self.index)
    }
}

/// Core keyboard mapping as returned by GetKeyboardMapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keymap {
    min_keycode: u8,
    keysyms_per_keycode: u8,
    keysyms: Vec<u32>,
}

impl Keymap {
    /// Build a keymap from the raw mapping table
    ///
    /// `keysyms` holds `keysyms_per_keycode` entries for every keycode
    /// starting at `min_keycode`.
    pub fn new(min_keycode: u8, keysyms_per_keycode: u8, keysyms: Vec<u32>) -> Self {
        Self {
            min_keycode,
            keysyms_per_keycode,
            keysyms,
        }
    }

    fn row(&self, code: u8) -> Option<&[u32]> {
        let per = usize::from(self.keysyms_per_keycode);
        if per == 0 || code < self.min_keycode {
            return None;
        }
        let start = usize::from(code - self.min_keycode) * per;
        self.keysyms.get(start..start + per)
    }

    /// Keysym bound to `code` in column `index`, or [`NO_SYMBOL`]
    pub fn keysym(&self, code: u8, index: u8) -> u32 {
        self.row(code)
            .and_then(|row| row.get(usize::from(index)).copied())
            .unwrap_or(NO_SYMBOL)
    }

    /// Every (keycode, index) pair producing `keysym`, lowest index first,
    /// then lowest keycode
    pub fn keycodes(&self, keysym: u32) -> Vec<KeyCode> {
        if keysym == NO_SYMBOL || self.keysyms_per_keycode == 0 {
            return Vec::new();
        }
        let per = usize::from(self.keysyms_per_keycode);
        let mut found: Vec<KeyCode> = self
            .keysyms
            .iter()
            .enumerate()
            .filter(|(_, &sym)| sym == keysym)
            .filter_map(|(pos, _)| {
                let code = u8::try_from(pos / per + usize::from(self.min_keycode)).ok()?;
                let index = u8::try_from(pos % per).ok()?;
                Some(KeyCode { code, index })
            })
            .collect();
        found.sort_by_key(|key| (key.index, key.code));
        found
    }

    /// Preferred key for `keysym`
    pub fn keycode(&self, keysym: u32) -> Option<KeyCode> {
        self.keycodes(keysym).into_iter().next()
    }

    /// Key that types `ch` under this layout
    ///
    /// Tries the keysym equal to the code point, then the `0xFF00 | cp`
    /// function-key convention for Latin-1 control codes, then the legacy
    /// keysym for the character (Greek, Cyrillic, Latin-2 ...), then the
    /// Unicode keysym.
    pub fn keycode_for_char(&self, ch: char) -> Option<KeyCode> {
        let cp = u32::from(ch);
        self.keycode(cp)
            .or_else(|| (cp <= 0xFF).then(|| self.keycode(0xFF00 | cp)).flatten())
            .or_else(|| self.keycode(Keysym::from_char(ch).raw()))
            .or_else(|| (cp > 0xFF).then(|| self.keycode(UNICODE_KEYSYM_BASE | cp)).flatten())
    }
}

/// Character typed by `keysym`, if it is printable or a known control key
pub fn keysym_to_char(keysym: u32) -> Option<char> {
    if keysym == NO_SYMBOL {
        return None;
    }
    if keysym <= 0xFF {
        return char::from_u32(keysym);
    }
    if CONTROL_KEYSYMS.iter().any(|sym| sym.raw() == keysym) {
        return char::from_u32(keysym & 0xFF);
    }
    if (UNICODE_KEYSYM_BASE..=UNICODE_KEYSYM_BASE + 0x10_FFFF).contains(&keysym) {
        return char::from_u32(keysym - UNICODE_KEYSYM_BASE);
    }
    Keysym::new(keysym).key_char()
}

/// Keysym of the third-level shift (AltGr) key
pub fn level3_shift_keysym() -> u32 {
    Keysym::ISO_Level3_Shift.raw()
}
