use thiserror::Error;

use crate::command::{run_command_text, CommandError};
use crate::geometry::Rect;

pub(crate) mod hyprland;

use self::hyprland::parse_displays;

/// One connected output, in global logical-pixel space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    pub name: String,
    pub bounds: Rect,
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("invalid monitor metadata: {message}")]
    InvalidMonitorMetadata { message: String },
    #[error("no displays connected")]
    NoDisplays,
}

pub type DisplayResult<T> = std::result::Result<T, DisplayError>;

/// Source of the current display layout. Implementations must query the
/// compositor on every call; outputs can be hot-plugged between calls.
pub trait DisplaySource: Send + Sync {
    fn list_displays(&self) -> DisplayResult<Vec<Display>>;
}

/// The display areas are expressed against: the one covering the global
/// origin, or the first listed when none does.
pub fn primary_display(displays: &[Display]) -> Option<&Display> {
    displays
        .iter()
        .find(|display| display.bounds.contains_point(0, 0))
        .or_else(|| displays.first())
}

#[derive(Debug, Default)]
pub struct HyprlandDisplays;

impl DisplaySource for HyprlandDisplays {
    fn list_displays(&self) -> DisplayResult<Vec<Display>> {
        let json = run_command_text("hyprctl", &["monitors", "-j"])?;
        parse_displays(&json)
    }
}
