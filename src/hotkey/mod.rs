//! Keeps the OS global-shortcut table in step with the macro list.
//!
//! The table is always rebuilt from scratch: every binding is revoked and the
//! ready macros are registered again in store order. A binding the OS refuses
//! is recorded in the [`SyncReport`] and skipped; it never stops the rest.

use std::collections::HashSet;

use thiserror::Error;

use crate::macros::{Hotkey, Macro, MacroId};

mod global;

pub use global::GlobalHotkeyBackend;

/// What a registered shortcut triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Capture(MacroId),
    StartSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortcutError {
    #[error("global shortcuts unavailable: {message}")]
    Unavailable { message: String },
    #[error("shortcut {hotkey} rejected: {message}")]
    Rejected { hotkey: Hotkey, message: String },
}

pub trait ShortcutBackend {
    fn unregister_all(&mut self) -> Result<(), ShortcutError>;
    fn register(&mut self, hotkey: &Hotkey, action: ShortcutAction) -> Result<(), ShortcutError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    #[error("failed to register {hotkey}: {source}")]
    RegistrationFailed {
        hotkey: Hotkey,
        #[source]
        source: ShortcutError,
    },
    #[error("{hotkey} is already bound in this pass")]
    Duplicate { hotkey: Hotkey },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOutcome {
    pub action: ShortcutAction,
    pub hotkey: Hotkey,
    pub result: Result<(), HotkeyError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<BindingOutcome>,
}

impl SyncReport {
    pub fn registered(&self) -> impl Iterator<Item = &BindingOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BindingOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn registered_macros(&self) -> Vec<MacroId> {
        self.registered()
            .filter_map(|outcome| match outcome.action {
                ShortcutAction::Capture(id) => Some(id),
                ShortcutAction::StartSelection => None,
            })
            .collect()
    }
}

pub struct HotkeyRegistry<B> {
    backend: B,
    selection_hotkey: Option<Hotkey>,
    active: Vec<(Hotkey, ShortcutAction)>,
}

impl<B: ShortcutBackend> HotkeyRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            selection_hotkey: None,
            active: Vec::new(),
        }
    }

    /// Also bind `hotkey` to starting an area selection on every sync.
    pub fn with_selection_hotkey(mut self, hotkey: Option<Hotkey>) -> Self {
        self.set_selection_hotkey(hotkey);
        self
    }

    /// Takes effect on the next [`synchronize`](Self::synchronize).
    pub fn set_selection_hotkey(&mut self, hotkey: Option<Hotkey>) {
        self.selection_hotkey = hotkey;
    }

    pub fn active(&self) -> &[(Hotkey, ShortcutAction)] {
        &self.active
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn revoke_all(&mut self) {
        if let Err(err) = self.backend.unregister_all() {
            tracing::warn!(%err, "failed to revoke global shortcuts");
        }
        self.active.clear();
    }

    pub fn synchronize(&mut self, macros: &[Macro]) -> SyncReport {
        self.revoke_all();

        let mut report = SyncReport::default();
        let mut bound: HashSet<Hotkey> = HashSet::new();
        let bindings = macros
            .iter()
            .filter(|item| item.is_ready())
            .filter_map(|item| {
                item.hotkey
                    .clone()
                    .map(|hotkey| (hotkey, ShortcutAction::Capture(item.id)))
            })
            .chain(
                self.selection_hotkey
                    .clone()
                    .map(|hotkey| (hotkey, ShortcutAction::StartSelection)),
            );

        for (hotkey, action) in bindings {
            let result = if bound.contains(&hotkey) {
                Err(HotkeyError::Duplicate {
                    hotkey: hotkey.clone(),
                })
            } else {
                self.backend
                    .register(&hotkey, action)
                    .map_err(|source| HotkeyError::RegistrationFailed {
                        hotkey: hotkey.clone(),
                        source,
                    })
            };

            match &result {
                Ok(()) => {
                    tracing::debug!(%hotkey, ?action, "registered global shortcut");
                    bound.insert(hotkey.clone());
                    self.active.push((hotkey.clone(), action));
                }
                Err(err) => tracing::warn!(%err, ?action, "skipping global shortcut"),
            }
            report.outcomes.push(BindingOutcome {
                action,
                hotkey,
                result,
            });
        }

        tracing::info!(
            registered = self.active.len(),
            failed = report.failed().count(),
            "global shortcuts synchronized"
        );
        report
    }
}
