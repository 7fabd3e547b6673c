//! Key bindings with enable flags and help labels.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// A named binding that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    keys: &'static [(KeyCode, KeyModifiers)],
    /// Key shown in the help line
    pub help_key: &'static str,
    /// Action shown in the help line
    pub help_desc: &'static str,
    pub enabled: bool,
}

impl Binding {
    pub const fn new(
        keys: &'static [(KeyCode, KeyModifiers)],
        help_key: &'static str,
        help_desc: &'static str,
    ) -> Self {
        Self {
            keys,
            help_key,
            help_desc,
            enabled: true,
        }
    }

    /// True if the binding is enabled and `key` is one of its keys.
    pub fn matches(&self, key: &KeyEvent) -> bool {
        self.enabled
            && self
                .keys
                .iter()
                .any(|(code, modifiers)| key.code == *code && key.modifiers == *modifiers)
    }
}

const START_STOP_KEYS: &[(KeyCode, KeyModifiers)] = &[(KeyCode::Char('s'), KeyModifiers::NONE)];
const RESET_KEYS: &[(KeyCode, KeyModifiers)] = &[(KeyCode::Char('r'), KeyModifiers::NONE)];
const QUIT_KEYS: &[(KeyCode, KeyModifiers)] = &[
    (KeyCode::Char('q'), KeyModifiers::NONE),
    (KeyCode::Char('c'), KeyModifiers::CONTROL),
];

/// The four bindings the timer understands.
///
/// `start` and `stop` share the `s` key; exactly one of them is enabled
/// at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    pub start: Binding,
    pub stop: Binding,
    pub reset: Binding,
    pub quit: Binding,
}

impl KeyMap {
    /// Bindings for a clock that starts out running.
    pub fn new() -> Self {
        let mut keymap = Self {
            start: Binding::new(START_STOP_KEYS, "s", "start"),
            stop: Binding::new(START_STOP_KEYS, "s", "stop"),
            reset: Binding::new(RESET_KEYS, "r", "reset"),
            quit: Binding::new(QUIT_KEYS, "q", "quit"),
        };
        keymap.sync_running(true);
        keymap
    }

    /// Enable `stop` while running, `start` otherwise.
    pub fn sync_running(&mut self, running: bool) {
        self.stop.enabled = running;
        self.start.enabled = !running;
    }

    /// Bindings listed while the countdown is on screen.
    pub fn running_help(&self) -> Vec<&Binding> {
        [&self.start, &self.stop, &self.reset, &self.quit]
            .into_iter()
            .filter(|b| b.enabled)
            .collect()
    }

    /// Bindings listed on the done screen.
    pub fn done_help(&self) -> Vec<&Binding> {
        [&self.reset, &self.quit]
            .into_iter()
            .filter(|b| b.enabled)
            .collect()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new()
    }
}
