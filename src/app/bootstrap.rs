use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{load_app_config_from, AppPaths};
use crate::error::AppResult;
use crate::hotkey::{GlobalHotkeyBackend, HotkeyRegistry};
use crate::macros::MacroStore;
use crate::orchestrator::{CaptureOrchestrator, CaptureSettings, Collaborators};
use crate::selection::{HyprlandSurfaces, SelectionSession, SurfaceReport};

use super::{App, Command};

pub type SystemApp = App<HyprlandSurfaces, GlobalHotkeyBackend>;

/// A wired application plus the channels that feed its run loop.
pub struct Launch {
    pub app: SystemApp,
    pub commands: mpsc::UnboundedSender<Command>,
    pub command_rx: mpsc::UnboundedReceiver<Command>,
    pub report_rx: mpsc::UnboundedReceiver<SurfaceReport>,
}

/// Wires the Hyprland, grim, wl-copy and global-hotkey backends around the
/// macro file and settings found at `paths`.
pub fn bootstrap_system(paths: AppPaths) -> AppResult<Launch> {
    let config = load_app_config_from(&paths.config);
    tracing::info!(
        auto_save = config.auto_save,
        save_dir = ?config.save_dir,
        selection_hotkey = ?config.selection_hotkey,
        "loaded config"
    );

    let store = Arc::new(MacroStore::open(&paths.macros)?);
    let settings = CaptureSettings::from_config(&config)?;
    let services = Collaborators::system(Duration::from_millis(config.feedback_duration_ms));
    let displays = services.displays.clone();
    let orchestrator = Arc::new(CaptureOrchestrator::new(store.clone(), services, settings));

    let (commands, command_rx) = mpsc::unbounded_channel();
    let (report_tx, report_rx) = mpsc::unbounded_channel();

    let shortcut_commands = commands.clone();
    let backend = GlobalHotkeyBackend::new(move |action| {
        if shortcut_commands.send(Command::from(action)).is_err() {
            tracing::debug!(?action, "command loop gone; dropping shortcut");
        }
    })?;
    let registry =
        HotkeyRegistry::new(backend).with_selection_hotkey(config.selection_hotkey.clone());
    let session = SelectionSession::new(
        displays,
        HyprlandSurfaces::new(config.settings_window_class.clone()),
        report_tx,
    );

    let app = App::new(store, orchestrator, registry, session)
        .with_config(config, Some(paths.config));
    Ok(Launch {
        app,
        commands,
        command_rx,
        report_rx,
    })
}
