//! Application context: owns the macro store, hotkey registry, selection
//! session and capture orchestrator, and routes every [`Command`] to them.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::config::{load_app_config_from, update_app_config_at, AppConfig};
use crate::error::{AppError, AppResult};
use crate::hotkey::{HotkeyRegistry, ShortcutBackend, SyncReport};
use crate::macros::{Macro, MacroId, MacroStore, MacroStoreError};
use crate::notification::APP_NAME;
use crate::orchestrator::{CaptureOrchestrator, CaptureSettings};
use crate::selection::{SelectionSession, SelectionSurfaces, SurfaceOutcome, SurfaceReport};

mod bootstrap;
mod command;
mod daemon;

pub use bootstrap::{bootstrap_system, Launch, SystemApp};
pub use command::{Command, Dispatched};
pub use daemon::{running_daemon, signal_reload, PidFile};

/// What a surface report amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Stale,
    Committed(Macro),
    Cancelled(Option<MacroId>),
}

/// Applies `report` to `session`, persisting a committed area into `store`.
pub fn resolve_report<S: SelectionSurfaces>(
    session: &mut SelectionSession<S>,
    store: &MacroStore,
    report: &SurfaceReport,
) -> AppResult<Resolved> {
    match session.accept(report) {
        None => Ok(Resolved::Stale),
        Some(SurfaceOutcome::Selected(area)) => {
            let updated = session.commit(area, |id, area| store.assign_area(id, area))??;
            Ok(Resolved::Committed(updated))
        }
        Some(SurfaceOutcome::Cancelled) => Ok(Resolved::Cancelled(session.cancel()?)),
    }
}

pub struct App<S, B> {
    store: Arc<MacroStore>,
    orchestrator: Arc<CaptureOrchestrator>,
    registry: HotkeyRegistry<B>,
    session: SelectionSession<S>,
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl<S, B> App<S, B>
where
    S: SelectionSurfaces,
    B: ShortcutBackend,
{
    pub fn new(
        store: Arc<MacroStore>,
        orchestrator: Arc<CaptureOrchestrator>,
        registry: HotkeyRegistry<B>,
        session: SelectionSession<S>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            registry,
            session,
            config: AppConfig::default(),
            config_path: None,
        }
    }

    /// Settings changes are written back to `path` when one is given.
    pub fn with_config(mut self, config: AppConfig, path: Option<PathBuf>) -> Self {
        self.config = config;
        self.config_path = path;
        self
    }

    pub fn store(&self) -> &Arc<MacroStore> {
        &self.store
    }

    pub fn registry(&self) -> &HotkeyRegistry<B> {
        &self.registry
    }

    pub fn session(&self) -> &SelectionSession<S> {
        &self.session
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn synchronize(&mut self) -> SyncReport {
        self.registry.synchronize(&self.store.list())
    }

    pub fn dispatch(&mut self, command: Command) -> AppResult<Dispatched> {
        tracing::debug!(?command, "dispatching command");
        match command {
            Command::Capture(id) => {
                let orchestrator = self.orchestrator.clone();
                Ok(Dispatched::CaptureStarted(tokio::spawn(async move {
                    orchestrator.capture(id).await
                })))
            }
            Command::StartSelection { target } => {
                if self.store.get(target).is_none() {
                    return Err(MacroStoreError::NotFound(target).into());
                }
                Ok(Dispatched::Selection(self.session.start(target)?))
            }
            Command::StartSelectionForPending => match self.store.first_pending() {
                Some(item) => Ok(Dispatched::Selection(self.session.start(item.id)?)),
                None => {
                    tracing::info!("no macro is waiting for an area");
                    Ok(Dispatched::NoPendingMacro)
                }
            },
            Command::CancelSelection => {
                let cancelled = if self.session.is_selecting() {
                    self.session.cancel()?
                } else {
                    None
                };
                Ok(Dispatched::SelectionCancelled(cancelled))
            }
            Command::CreateMacro(draft) => {
                let item = self.store.create(draft)?;
                self.synchronize();
                Ok(Dispatched::Saved(item))
            }
            Command::UpdateMacro { id, draft } => {
                let item = self.store.update(id, draft)?;
                tracing::info!(%id, name = %item.name, "macro updated");
                self.synchronize();
                Ok(Dispatched::Saved(item))
            }
            Command::DeleteMacro(id) => {
                let removed = self.store.delete(id)?;
                if self.session.cancel_targeting(id)? {
                    tracing::info!(%id, "cancelled selection for deleted macro");
                }
                tracing::info!(%id, name = %removed.name, "macro deleted");
                self.synchronize();
                Ok(Dispatched::Removed(removed))
            }
            Command::RefreshHotkeys => {
                self.store.reload()?;
                Ok(Dispatched::Synced(self.synchronize()))
            }
            Command::Reload => {
                self.reload_config()?;
                self.store.reload()?;
                Ok(Dispatched::Synced(self.synchronize()))
            }
            Command::SetAutoSave(enabled) => {
                self.orchestrator.set_auto_save(enabled);
                self.update_config(|config| config.auto_save = enabled)?;
                Ok(Dispatched::SettingsUpdated)
            }
            Command::SetSaveDir(dir) => {
                self.orchestrator.set_save_dir(dir.clone());
                self.update_config(|config| config.save_dir = Some(dir.clone()))?;
                Ok(Dispatched::SettingsUpdated)
            }
            Command::Shutdown => Ok(Dispatched::Shutdown),
        }
    }

    /// Resolves a selection surface report. A committed area is persisted
    /// and the shortcut table rebuilt so the macro becomes usable.
    pub fn handle_report(&mut self, report: SurfaceReport) -> AppResult<Resolved> {
        let resolved = resolve_report(&mut self.session, &self.store, &report)?;
        if let Resolved::Committed(item) = &resolved {
            self.synchronize();
            self.notify(format!("Area set for \"{}\"", item.name));
        }
        Ok(resolved)
    }

    /// Processes commands and surface reports until `shutdown` resolves, a
    /// [`Command::Shutdown`] arrives or every command sender is gone.
    /// SIGHUP reloads the config and macro files.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut reports: mpsc::UnboundedReceiver<SurfaceReport>,
        shutdown: impl Future<Output = ()>,
    ) -> AppResult<()> {
        let mut hangup = signal(SignalKind::hangup()).map_err(AppError::Signal)?;
        tokio::pin!(shutdown);

        let report = self.synchronize();
        let stats = self.store.statistics();
        tracing::info!(
            total = stats.total,
            ready = stats.ready,
            pending = stats.pending,
            bound = report.registered().count(),
            "ft-capture running"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received; reloading config and macros");
                    if let Err(err) = self.dispatch(Command::Reload) {
                        self.report_failure(&err);
                    }
                }
                Some(report) = reports.recv() => {
                    if let Err(err) = self.handle_report(report) {
                        self.report_failure(&err);
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => match self.dispatch(command) {
                        Ok(Dispatched::Shutdown) => break,
                        Ok(_) => {}
                        Err(err) => self.report_failure(&err),
                    },
                    None => break,
                },
            }
        }

        self.stop()
    }

    fn stop(&mut self) -> AppResult<()> {
        if self.session.is_selecting() {
            self.session.cancel()?;
        }
        self.registry.revoke_all();
        tracing::info!("ft-capture stopped");
        Ok(())
    }

    /// Applies `change` in memory and to the file on disk, keeping whatever
    /// else the file holds.
    fn update_config(&mut self, change: impl Fn(&mut AppConfig)) -> AppResult<()> {
        change(&mut self.config);
        if let Some(path) = &self.config_path {
            update_app_config_at(path, change)?;
        }
        Ok(())
    }

    fn reload_config(&mut self) -> AppResult<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        let config = load_app_config_from(path);
        self.orchestrator
            .replace_settings(CaptureSettings::from_config(&config)?);
        self.registry
            .set_selection_hotkey(config.selection_hotkey.clone());
        self.config = config;
        tracing::info!(auto_save = self.config.auto_save, "config reloaded");
        Ok(())
    }

    fn report_failure(&self, err: &AppError) {
        tracing::warn!(%err, "command failed");
        self.notify(err.to_string());
    }

    fn notify(&self, body: String) {
        let notifier = self.orchestrator.notifier();
        tokio::task::spawn_blocking(move || notifier.notify(APP_NAME, &body));
    }
}
