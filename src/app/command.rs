use std::path::PathBuf;

use tokio::task::JoinHandle;

use crate::hotkey::{ShortcutAction, SyncReport};
use crate::macros::{Macro, MacroDraft, MacroId};
use crate::orchestrator::CaptureOutcome;
use crate::selection::StartOutcome;

/// Everything the application reacts to, whether it comes from a global
/// shortcut or a caller of the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Capture(MacroId),
    StartSelection { target: MacroId },
    /// Select an area for the first macro that has none yet.
    StartSelectionForPending,
    CancelSelection,
    CreateMacro(MacroDraft),
    UpdateMacro { id: MacroId, draft: MacroDraft },
    DeleteMacro(MacroId),
    /// Reload macro definitions and rebuild the shortcut table.
    RefreshHotkeys,
    /// Like `RefreshHotkeys`, but settings are re-read as well.
    Reload,
    SetAutoSave(bool),
    SetSaveDir(PathBuf),
    Shutdown,
}

impl From<ShortcutAction> for Command {
    fn from(action: ShortcutAction) -> Self {
        match action {
            ShortcutAction::Capture(id) => Self::Capture(id),
            ShortcutAction::StartSelection => Self::StartSelectionForPending,
        }
    }
}

#[derive(Debug)]
pub enum Dispatched {
    CaptureStarted(JoinHandle<CaptureOutcome>),
    Selection(StartOutcome),
    NoPendingMacro,
    SelectionCancelled(Option<MacroId>),
    Saved(Macro),
    Removed(Macro),
    Synced(SyncReport),
    SettingsUpdated,
    Shutdown,
}
