//! Macro definitions: a named hotkey bound to a screen area.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{Color, Rect};

mod hotkey;
mod store;

pub use hotkey::{Hotkey, HotkeyParseError};
pub use store::{MacroStats, MacroStore, MacroStoreError, MacroStoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroId(Uuid);

impl MacroId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MacroId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MacroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MacroId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub id: MacroId,
    pub name: String,
    #[serde(default)]
    pub hotkey: Option<Hotkey>,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub area: Option<Rect>,
}

impl Macro {
    /// A macro without an area is pending: it is never registered or captured.
    pub fn is_ready(&self) -> bool {
        self.area.is_some()
    }
}

/// User-editable fields of a macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDraft {
    pub name: String,
    pub hotkey: Option<Hotkey>,
    pub color: Color,
}

impl MacroDraft {
    pub fn new(name: impl Into<String>, hotkey: Option<Hotkey>) -> Self {
        Self {
            name: name.into(),
            hotkey,
            color: Color::default(),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}
