//! Escape-hatch input gate
//!
//! Decides for every key press whether it reaches the page. With shortcuts
//! locked down the usual exit/reload combinations are swallowed; one secret
//! combination (Ctrl+Shift+<letter>) always terminates the kiosk.

use crate::config::KioskConfig;
use crate::constants::keys;

/// A key press with the modifiers held at the time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    /// Key name: a single character for printable keys, `F1`..`F12` etc otherwise
    pub key: String,
    pub control: bool,
    /// Command / Super
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn control(mut self) -> Self {
        self.control = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    fn command_held(&self) -> bool {
        self.control || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputVerdict {
    /// Pass to the page untouched
    Allow,
    /// Swallow the default action
    Suppress,
    /// Debug exit: shut the kiosk down
    Terminate,
}

#[derive(Debug, Clone)]
pub struct InputGate {
    lockdown: bool,
    debug_exit_key: Option<String>,
}

impl InputGate {
    pub fn from_config(config: &KioskConfig) -> Self {
        Self {
            lockdown: config.disable_shortcuts,
            debug_exit_key: config
                .enable_debug_exit
                .then(|| config.debug_exit_key.clone()),
        }
    }

    /// Whether any key can be suppressed
    pub fn lockdown(&self) -> bool {
        self.lockdown
    }

    pub fn decide(&self, input: &KeyInput) -> InputVerdict {
        if input.key == keys::FULLSCREEN_TOGGLE {
            return InputVerdict::Allow;
        }

        if let Some(exit_key) = &self.debug_exit_key
            && input.command_held()
            && input.shift
            && input.key.eq_ignore_ascii_case(exit_key)
        {
            return InputVerdict::Terminate;
        }

        if !self.lockdown {
            return InputVerdict::Allow;
        }

        if input.command_held() {
            let key = input.key.to_ascii_lowercase();
            if keys::CTRL_DENY_LIST.contains(&key.as_str()) {
                return InputVerdict::Suppress;
            }
        }

        if input.alt && input.key.eq_ignore_ascii_case(keys::CLOSE_WINDOW) {
            return InputVerdict::Suppress;
        }

        InputVerdict::Allow
    }
}
