use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyParseError {
    #[error("hotkey is empty")]
    Empty,
    #[error("hotkey '{0}' needs at least one modifier")]
    MissingModifier(String),
    #[error("hotkey '{0}' has no key")]
    MissingKey(String),
    #[error("hotkey '{0}' has more than one key")]
    MultipleKeys(String),
    #[error("unknown key '{key}' in hotkey '{hotkey}'")]
    UnknownKey { hotkey: String, key: String },
}

const CTRL: u8 = 1;
const ALT: u8 = 1 << 1;
const SHIFT: u8 = 1 << 2;
const SUPER: u8 = 1 << 3;

const MODIFIER_ORDER: [(u8, &str); 4] = [
    (CTRL, "Ctrl"),
    (ALT, "Alt"),
    (SHIFT, "Shift"),
    (SUPER, "Super"),
];

const NAMED_KEYS: [(&[&str], &str); 15] = [
    (&["space"], "Space"),
    (&["enter", "return"], "Enter"),
    (&["tab"], "Tab"),
    (&["escape", "esc"], "Escape"),
    (&["backspace"], "Backspace"),
    (&["delete", "del"], "Delete"),
    (&["insert", "ins"], "Insert"),
    (&["home"], "Home"),
    (&["end"], "End"),
    (&["pageup", "pgup"], "PageUp"),
    (&["pagedown", "pgdn"], "PageDown"),
    (&["up", "arrowup"], "Up"),
    (&["down", "arrowdown"], "Down"),
    (&["left", "arrowleft"], "Left"),
    (&["right", "arrowright"], "Right"),
];

/// A key combination in canonical form, e.g. `Ctrl+Shift+A`.
///
/// Parsing accepts the usual aliases (`CommandOrControl`, `cmd`, `option`,
/// `KeyA`, `Digit1`, ...) in any order and case; two hotkeys are equal when
/// their canonical forms are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey(String);

impl Hotkey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn parse_modifier(token: &str) -> Option<u8> {
    match token {
        "ctrl" | "control" | "cmd" | "command" | "commandorcontrol" | "commandorctrl"
        | "cmdorctrl" | "cmdorcontrol" => Some(CTRL),
        "alt" | "option" | "altgr" => Some(ALT),
        "shift" => Some(SHIFT),
        "super" | "meta" | "win" | "logo" => Some(SUPER),
        _ => None,
    }
}

fn parse_key(token: &str) -> Option<String> {
    let bare = token
        .strip_prefix("key")
        .or_else(|| token.strip_prefix("digit"))
        .filter(|rest| rest.len() == 1)
        .unwrap_or(token);

    let mut chars = bare.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Some(c.to_ascii_uppercase().to_string());
        }
        return None;
    }

    if let Some(number) = bare.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&number) {
            return Some(format!("F{number}"));
        }
    }

    NAMED_KEYS
        .iter()
        .find(|(aliases, _)| aliases.contains(&bare))
        .map(|(_, canonical)| (*canonical).to_string())
}

impl FromStr for Hotkey {
    type Err = HotkeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err(HotkeyParseError::Empty);
        }

        let mut modifiers = 0u8;
        let mut key: Option<String> = None;
        for token in raw.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            let lower = token.to_ascii_lowercase();
            if let Some(flag) = parse_modifier(&lower) {
                modifiers |= flag;
                continue;
            }
            let parsed = parse_key(&lower).ok_or_else(|| HotkeyParseError::UnknownKey {
                hotkey: raw.to_string(),
                key: token.to_string(),
            })?;
            if key.replace(parsed).is_some() {
                return Err(HotkeyParseError::MultipleKeys(raw.to_string()));
            }
        }

        let key = key.ok_or_else(|| HotkeyParseError::MissingKey(raw.to_string()))?;
        if modifiers == 0 {
            return Err(HotkeyParseError::MissingModifier(raw.to_string()));
        }

        let mut parts: Vec<&str> = MODIFIER_ORDER
            .iter()
            .filter(|(flag, _)| modifiers & flag != 0)
            .map(|(_, name)| *name)
            .collect();
        parts.push(&key);
        Ok(Self(parts.join("+")))
    }
}

impl TryFrom<String> for Hotkey {
    type Error = HotkeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hotkey> for String {
    fn from(hotkey: Hotkey) -> Self {
        hotkey.0
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
