use crate::dom::FocusContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct KeyChord {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyChord {
    pub fn key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            shift: true,
            ..Self::default()
        }
    }

    /// Key comparison ignores case so `Shift+d` and `Shift+D` match.
    pub fn matches(&self, other: &KeyChord) -> bool {
        self.key.eq_ignore_ascii_case(&other.key)
            && self.ctrl == other.ctrl
            && self.shift == other.shift
            && self.alt == other.alt
            && self.meta == other.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    ToggleTracing,
    EndSession,
    ToggleTerminal,
    DebugElement,
    ToggleHoverPause,
    QuickActions,
    Escape,
}

#[derive(Debug, Clone)]
pub struct ShortcutMap {
    bindings: Vec<(KeyChord, ShortcutAction)>,
}

impl Default for ShortcutMap {
    fn default() -> Self {
        Self {
            bindings: vec![
                (KeyChord::ctrl_shift("L"), ShortcutAction::ToggleTracing),
                (KeyChord::ctrl_shift("E"), ShortcutAction::EndSession),
                (KeyChord::ctrl_shift("T"), ShortcutAction::ToggleTerminal),
                (KeyChord::ctrl_shift("D"), ShortcutAction::DebugElement),
                (KeyChord::ctrl_shift("P"), ShortcutAction::ToggleHoverPause),
                (KeyChord::ctrl_shift("K"), ShortcutAction::QuickActions),
                (KeyChord::key("Escape"), ShortcutAction::Escape),
            ],
        }
    }
}

impl ShortcutMap {
    pub fn new(bindings: Vec<(KeyChord, ShortcutAction)>) -> Self {
        Self { bindings }
    }

    /// Rebinds `action`, replacing its previous chord.
    pub fn bind(&mut self, chord: KeyChord, action: ShortcutAction) {
        self.bindings.retain(|(_, a)| *a != action);
        self.bindings.push((chord, action));
    }

    pub fn chord_for(&self, action: ShortcutAction) -> Option<&KeyChord> {
        self.bindings
            .iter()
            .find(|(_, a)| *a == action)
            .map(|(chord, _)| chord)
    }

    /// Resolves a keystroke. Nothing fires while debugging mode is off or
    /// while focus is in an editable field.
    pub fn resolve(
        &self,
        chord: &KeyChord,
        debug_mode_on: bool,
        focus: FocusContext,
    ) -> Option<ShortcutAction> {
        if !debug_mode_on || focus.is_editable() {
            return None;
        }
        self.bindings
            .iter()
            .find(|(bound, _)| bound.matches(chord))
            .map(|(_, action)| *action)
    }
}
