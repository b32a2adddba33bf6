//! Modifier mask definitions and state resolution
//!
//! Provides constants for the X11 core modifier bits and a struct
//! describing which modifiers are held for a single key event.

/// Modifier bit masks from the X11 core protocol (KeyButMask)
///
/// Only the bits that select a keysym column are named here.
pub mod masks {
    /// Shift key modifier bit
    pub const SHIFT: u16 = 1 << 0;
    /// Mod1, bound to Alt on practically every layout
    pub const ALT: u16 = 1 << 3;
    /// Mod5, usually ISO_Level3_Shift
    pub const LEVEL3: u16 = 1 << 7;
}

/// Modifiers held while a key event was generated
///
/// The third-level shift (AltGr) flag is not part of the event mask on
/// most servers and has to be tracked by the caller across events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub shift: bool,
    pub alt: bool,
    /// ISO_Level3_Shift is held (tracked from its own press/release)
    pub level3: bool,
}

impl ModifierState {
    /// Decode a raw event mask plus the tracked third-level-shift flag
    pub fn from_mask(mask: u16, level3: bool) -> Self {
        let held = |bit: u16| mask & bit == bit;
        Self {
            shift: held(masks::SHIFT),
            alt: held(masks::ALT),
            level3,
        }
    }

    /// Keysym column to look up for this state
    ///
    /// None = 0, Shift = 1, Alt = 2, Alt + Shift = 3,
    /// AltGr = 4, AltGr + Shift = 5. Lock, Control and the remaining
    /// ModN bits do not select a column.
    pub fn index(&self) -> u8 {
        let mut index = 0;
        if self.shift {
            index += 1;
        }
        if self.alt {
            index += 2;
        }
        if self.level3 {
            index += 4;
        }
        index
    }
}

/// Event mask that reproduces the given modifier index when injected
pub fn index_to_mask(index: u8) -> u16 {
    let mut mask = 0;
    if index & 1 != 0 {
        mask |= masks::SHIFT;
    }
    if index & 2 != 0 {
        mask |= masks::ALT;
    }
    if index & 4 != 0 {
        mask |= masks::LEVEL3;
    }
    mask
}
