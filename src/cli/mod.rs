//! Command-line surface. `run` starts the hotkey daemon; the other commands
//! edit macros and settings on disk or perform a single selection/capture.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::app::{
    bootstrap_system, resolve_report, running_daemon, signal_reload, PidFile, Resolved,
};
use crate::config::{load_app_config_from, update_app_config_at, AppConfig, AppPaths};
use crate::display::HyprlandDisplays;
use crate::geometry::Color;
use crate::macros::{Hotkey, Macro, MacroDraft, MacroId, MacroStore};
use crate::orchestrator::{
    CaptureOrchestrator, CaptureOutcome, CaptureSettings, Collaborators, SaveOutcome,
};
use crate::selection::{HyprlandSurfaces, SelectionSession, StartOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "ft-capture",
    version,
    about = "Capture fixed screen regions to the clipboard with global hotkeys"
)]
pub struct Cli {
    /// Directory holding config.json and macros.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register hotkeys and capture until interrupted (default)
    Run,
    /// Show macros in store order
    List {
        /// Only macros that have an area
        #[arg(long)]
        ready: bool,
        #[arg(long)]
        json: bool,
    },
    /// Create a macro; pick its area afterwards with `select`
    Add(NewMacroArgs),
    /// Change name, hotkey or color of a macro
    Edit(EditMacroArgs),
    /// Delete a macro
    Remove { id: MacroId },
    /// Pick the capture area of a macro interactively
    Select { id: MacroId },
    /// Capture a macro's area once
    Capture { id: MacroId },
    /// Turn saving captures to disk on or off
    #[command(name = "auto-save")]
    AutoSave {
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Directory auto-saved captures are written to
    #[command(name = "save-dir")]
    SaveDir { path: PathBuf },
}

#[derive(Args, Debug)]
struct NewMacroArgs {
    name: String,
    /// e.g. Ctrl+Shift+1
    #[arg(long)]
    hotkey: Option<Hotkey>,
    /// Highlight color, e.g. #4CAF50
    #[arg(long)]
    color: Option<Color>,
}

#[derive(Args, Debug)]
struct EditMacroArgs {
    id: MacroId,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, conflicts_with = "clear_hotkey")]
    hotkey: Option<Hotkey>,
    #[arg(long)]
    clear_hotkey: bool,
    #[arg(long)]
    color: Option<Color>,
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init();
    let paths = AppPaths::resolve(cli.config_dir.as_deref())
        .context("cannot locate the ft-capture config directory")?;

    let command = cli.command.unwrap_or(Commands::Run);
    let changes_files = command.changes_files();
    match command {
        Commands::Run => return run_daemon(paths).await,
        Commands::List { ready, json } => list(&paths, ready, json)?,
        Commands::Add(args) => add(&paths, args)?,
        Commands::Edit(args) => edit(&paths, args)?,
        Commands::Remove { id } => {
            let removed = open_store(&paths)?.delete(id)?;
            println!("removed {} ({})", removed.name, removed.id);
        }
        Commands::Select { id } => select(&paths, id).await?,
        Commands::Capture { id } => capture(&paths, id).await?,
        Commands::AutoSave { state } => update_config(&paths, |config| config.auto_save = state)?,
        Commands::SaveDir { path } => {
            update_config(&paths, move |config| config.save_dir = Some(path))?
        }
    }
    if changes_files {
        notify_daemon(&paths);
    }
    Ok(())
}

impl Commands {
    /// Whether the command edits `macros.json` or `config.json`.
    fn changes_files(&self) -> bool {
        matches!(
            self,
            Self::Add(_)
                | Self::Edit(_)
                | Self::Remove { .. }
                | Self::Select { .. }
                | Self::AutoSave { .. }
                | Self::SaveDir { .. }
        )
    }
}

/// A running daemon only sees file edits after a reload.
fn notify_daemon(paths: &AppPaths) {
    match signal_reload(&paths.pid) {
        Ok(Some(pid)) => println!("reloaded running daemon (pid {pid})"),
        Ok(None) => {}
        Err(err) => tracing::warn!(%err, "failed to reach the running daemon"),
    }
}

async fn run_daemon(paths: AppPaths) -> Result<()> {
    if let Some(pid) = running_daemon(&paths.pid) {
        bail!("ft-capture is already running (pid {pid})");
    }
    // SIGHUP must be handled before the pid file makes this process findable
    let _hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let _pid_file = PidFile::create(&paths.pid)
        .with_context(|| format!("failed to write {}", paths.pid.display()))?;
    let launch = bootstrap_system(paths).context("failed to start ft-capture")?;
    let _commands = launch.commands;
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    launch
        .app
        .run(launch.command_rx, launch.report_rx, shutdown)
        .await?;
    Ok(())
}

fn open_store(paths: &AppPaths) -> Result<MacroStore> {
    MacroStore::open(&paths.macros)
        .with_context(|| format!("failed to open {}", paths.macros.display()))
}

fn describe(item: &Macro) -> String {
    let hotkey = item.hotkey.as_ref().map_or("-", Hotkey::as_str);
    let area = item
        .area
        .map_or_else(|| "pending".to_string(), |area| area.to_string());
    format!("{}  {:<20} {:<16} {}  {}", item.id, item.name, hotkey, item.color, area)
}

fn list(paths: &AppPaths, ready: bool, json: bool) -> Result<()> {
    let store = open_store(paths)?;
    let macros = if ready {
        store.ready_macros()
    } else {
        store.list()
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&macros)?);
        return Ok(());
    }
    for item in &macros {
        println!("{}", describe(item));
    }
    let stats = store.statistics();
    println!(
        "{} macros, {} ready, {} pending",
        stats.total, stats.ready, stats.pending
    );
    Ok(())
}

fn add(paths: &AppPaths, args: NewMacroArgs) -> Result<()> {
    let draft = MacroDraft::new(args.name, args.hotkey).with_color(args.color.unwrap_or_default());
    let item = open_store(paths)?.create(draft)?;
    println!("{}", describe(&item));
    Ok(())
}

fn edit(paths: &AppPaths, args: EditMacroArgs) -> Result<()> {
    let store = open_store(paths)?;
    let Some(current) = store.get(args.id) else {
        bail!("no macro with id {}", args.id);
    };
    let hotkey = match (args.hotkey, args.clear_hotkey) {
        (_, true) => None,
        (Some(hotkey), false) => Some(hotkey),
        (None, false) => current.hotkey,
    };
    let draft = MacroDraft::new(args.name.unwrap_or(current.name), hotkey)
        .with_color(args.color.unwrap_or(current.color));
    let item = store.update(args.id, draft)?;
    println!("{}", describe(&item));
    Ok(())
}

async fn select(paths: &AppPaths, id: MacroId) -> Result<()> {
    let config = load_app_config_from(&paths.config);
    let store = open_store(paths)?;
    if store.get(id).is_none() {
        bail!("no macro with id {id}");
    }

    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let mut session = SelectionSession::new(
        Arc::new(HyprlandDisplays),
        HyprlandSurfaces::new(config.settings_window_class),
        report_tx,
    );
    if let StartOutcome::AlreadySelecting = session.start(id)? {
        bail!("a selection is already running");
    }

    while let Some(report) = reports.recv().await {
        match resolve_report(&mut session, &store, &report)? {
            Resolved::Stale => continue,
            Resolved::Committed(item) => {
                println!("{}", describe(&item));
                return Ok(());
            }
            Resolved::Cancelled(_) => {
                println!("selection cancelled");
                return Ok(());
            }
        }
    }
    bail!("selection ended without a result")
}

async fn capture(paths: &AppPaths, id: MacroId) -> Result<()> {
    let config = load_app_config_from(&paths.config);
    let store = Arc::new(open_store(paths)?);
    let settings = CaptureSettings::from_config(&config)?;
    let services = Collaborators::system(Duration::from_millis(config.feedback_duration_ms));
    let orchestrator = CaptureOrchestrator::new(store, services, settings);

    match orchestrator.capture(id).await {
        CaptureOutcome::Captured { save } => {
            match save {
                SaveOutcome::Disabled => println!("copied to clipboard"),
                SaveOutcome::Saved(path) => {
                    println!("copied to clipboard and saved {}", path.display())
                }
                SaveOutcome::Failed(reason) => {
                    println!("copied to clipboard; saving failed: {reason}")
                }
            }
            Ok(())
        }
        CaptureOutcome::NotFound => bail!("no macro with id {id}"),
        CaptureOutcome::NoArea { name } => bail!("macro \"{name}\" has no area assigned"),
        CaptureOutcome::CaptureUnavailable { reason } => bail!("capture failed: {reason}"),
        CaptureOutcome::ClipboardFailed { reason } => bail!("clipboard write failed: {reason}"),
    }
}

fn update_config(paths: &AppPaths, change: impl FnOnce(&mut AppConfig)) -> Result<()> {
    let config = update_app_config_at(&paths.config, change)?;
    println!(
        "auto-save {}, save directory {}",
        if config.auto_save { "on" } else { "off" },
        config
            .save_dir
            .as_ref()
            .map_or_else(|| "default".to_string(), |dir| dir.display().to_string())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["ft-capture"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn add_parses_hotkey_and_color() {
        let cli = Cli::try_parse_from([
            "ft-capture",
            "add",
            "Chart",
            "--hotkey",
            "cmdorctrl+shift+1",
            "--color",
            "#FF0000",
        ])
        .unwrap();

        let Some(Commands::Add(args)) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.hotkey.unwrap().as_str(), "Ctrl+Shift+1");
        assert_eq!(args.color, Some(Color::new(255, 0, 0)));
    }

    #[test]
    fn invalid_hotkey_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["ft-capture", "add", "Chart", "--hotkey", "A"]).is_err());
    }

    #[test]
    fn auto_save_accepts_on_off() {
        let cli = Cli::try_parse_from(["ft-capture", "auto-save", "off"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::AutoSave { state: false })));
        assert!(Cli::try_parse_from(["ft-capture", "auto-save", "maybe"]).is_err());
    }

    #[test]
    fn only_editing_commands_reload_the_daemon() {
        fn parse(args: &[&str]) -> Commands {
            Cli::try_parse_from(args)
                .unwrap()
                .command
                .unwrap_or(Commands::Run)
        }

        assert!(parse(&["ft-capture", "add", "Chart"]).changes_files());
        assert!(parse(&["ft-capture", "auto-save", "on"]).changes_files());
        assert!(parse(&["ft-capture", "save-dir", "/tmp/shots"]).changes_files());
        assert!(!parse(&["ft-capture", "list"]).changes_files());
        assert!(!parse(&["ft-capture"]).changes_files());
    }

    #[test]
    fn config_dir_is_global() {
        let cli = Cli::try_parse_from(["ft-capture", "list", "--config-dir", "/tmp/ft"]).unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/ft")));
    }
}
