//! Synthetic typing of hotstring expansions
//!
//! Deletes the typed abbreviation with backspaces and types the
//! replacement text key by key into the focused window.

use tracing::{debug, warn};

use super::{KeyCode, Keyboard, KeyboardError, Keymap};

/// Character produced by the BackSpace key
pub const BACKSPACE: char = '\x08';

/// Outcome of a single expansion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandReport {
    /// Backspaces actually sent
    pub backspaces: usize,
    /// Characters of the replacement that were typed
    pub typed: usize,
    /// Characters skipped because the layout has no key for them
    pub skipped: usize,
}

/// Replace line feeds with carriage returns
///
/// There is no line-feed key to synthesize, so `"\r\n"` collapses to
/// `"\r"` first and any remaining `"\n"` becomes `"\r"`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\r").replace('\n', "\r")
}

/// Types expansions through a [`Keyboard`]
pub struct KeySynthesizer<K> {
    keyboard: K,
}

impl<K: Keyboard> KeySynthesizer<K> {
    pub fn new(keyboard: K) -> Self {
        Self { keyboard }
    }

    /// Access the underlying keyboard
    pub fn keyboard_mut(&mut self) -> &mut K {
        &mut self.keyboard
    }

    /// Key that types `ch` under `keymap`
    pub fn resolve(keymap: &Keymap, ch: char) -> Result<KeyCode, KeyboardError> {
        keymap
            .keycode_for_char(ch)
            .ok_or(KeyboardError::UnresolvedCharacter(ch))
    }

    /// Erase `backspaces` characters and type `text` in their place
    ///
    /// Characters without a key in the current layout are skipped; the
    /// rest of the text is still typed. Only display errors abort.
    pub fn expand(
        &mut self,
        keymap: &Keymap,
        backspaces: usize,
        text: &str,
    ) -> Result<ExpandReport, KeyboardError> {
        let mut report = ExpandReport::default();
        self.keyboard.focus()?;

        match Self::resolve(keymap, BACKSPACE) {
            Ok(key) => {
                for _ in 0..backspaces {
                    self.keyboard.send(key)?;
                    report.backspaces += 1;
                }
            }
            Err(e) => warn!(%e, backspaces, "cannot erase the typed abbreviation"),
        }
        self.keyboard.flush()?;

        for ch in normalize_line_endings(text).chars() {
            match Self::resolve(keymap, ch) {
                Ok(key) => {
                    self.keyboard.send(key)?;
                    report.typed += 1;
                }
                Err(e) => {
                    debug!(%e, "skipping character");
                    report.skipped += 1;
                }
            }
        }
        self.keyboard.flush()?;

        Ok(report)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingKeyboard;
    use super::*;
    use crate::keyboard::fixtures::{us_layout, CODE_BACKSPACE, CODE_RETURN};

    fn synth() -> (KeySynthesizer<RecordingKeyboard>, Keymap) {
        let keymap = us_layout();
        (
            KeySynthesizer::new(RecordingKeyboard::new(keymap.clone())),
            keymap,
        )
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\nc\rd"), "a\rb\rc\rd");
        assert_eq!(normalize_line_endings("\n\n"), "\r\r");
        assert_eq!(normalize_line_endings("plain"), "plain");
    }

    #[test]
    fn test_expand_erases_then_types() {
        let (mut synth, keymap) = synth();
        let report = synth.expand(&keymap, 3, "dufferzafar").unwrap();
        assert_eq!(
            report,
            ExpandReport {
                backspaces: 3,
                typed: 11,
                skipped: 0
            }
        );

        let kb = synth.keyboard_mut();
        assert_eq!(kb.sent.len(), 14);
        assert!(kb.sent[..3].iter().all(|k| k.code == CODE_BACKSPACE));
        assert_eq!(kb.typed(), "\x08\x08\x08dufferzafar");
        assert_eq!(kb.focus_calls, 1);
        assert!(kb.flushes >= 1);
    }

    #[test]
    fn test_expand_uses_shift_for_uppercase() {
        let (mut synth, keymap) = synth();
        synth.expand(&keymap, 0, "Hi!").unwrap();
        let kb = synth.keyboard_mut();
        assert_eq!(kb.sent[0].index, 1);
        assert_eq!(kb.sent[1].index, 0);
        assert_eq!(kb.sent[2].index, 1);
        assert_eq!(kb.typed(), "Hi!");
    }

    #[test]
    fn test_unmappable_characters_are_skipped() {
        let (mut synth, keymap) = synth();
        let report = synth.expand(&keymap, 0, "a~b").unwrap();
        assert_eq!(report.typed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(synth.keyboard_mut().typed(), "ab");
    }

    #[test]
    fn test_line_feeds_are_typed_as_return() {
        let (mut synth, keymap) = synth();
        synth.expand(&keymap, 0, "a\r\nb\nc").unwrap();
        let kb = synth.keyboard_mut();
        let returns = kb.sent.iter().filter(|k| k.code == CODE_RETURN).count();
        assert_eq!(returns, 2);
        assert_eq!(kb.typed(), "a\rb\rc");
    }

    #[test]
    fn test_missing_backspace_key_still_types_text() {
        let keymap = Keymap::new(8, 1, vec![u32::from('o'), u32::from('k')]);
        let mut synth = KeySynthesizer::new(RecordingKeyboard::new(keymap.clone()));
        let report = synth.expand(&keymap, 2, "ok").unwrap();
        assert_eq!(
            report,
            ExpandReport {
                backspaces: 0,
                typed: 2,
                skipped: 0
            }
        );
        assert_eq!(synth.keyboard_mut().typed(), "ok");
    }

    #[test]
    fn test_resolve_reports_unresolved_character() {
        let err = KeySynthesizer::<RecordingKeyboard>::resolve(&us_layout(), 'ツ').unwrap_err();
        assert!(matches!(err, KeyboardError::UnresolvedCharacter('ツ')));
    }
}
