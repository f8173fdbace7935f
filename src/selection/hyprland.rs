use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{SelectionError, SelectionResult, SelectionSurfaces, SurfaceHandle, SurfaceReporter};
use crate::command::{cleanup_command_child, run_command_text};
use crate::display::hyprland::{parse_active_window_class, parse_focused_workspace};
use crate::display::{Display, DisplayError};

const SLURP_POLL_INTERVAL: Duration = Duration::from_millis(24);
const HIDDEN_WORKSPACE: &str = "special:ftcapture";

type Reporters = Arc<Mutex<Vec<SurfaceReporter>>>;

#[derive(Debug)]
struct SlurpRun {
    session: u64,
    reporters: Reporters,
    handles: Vec<u64>,
    cancel: CancellationToken,
}

/// Selection surfaces backed by `slurp` on Hyprland.
///
/// slurp already spans every output, so all surfaces of one session share a
/// single slurp process. Its result is routed to the display containing the
/// picked origin and reported in that display's coordinates.
#[derive(Debug, Default)]
pub struct HyprlandSurfaces {
    window_class: Option<String>,
    run: Mutex<Option<SlurpRun>>,
    next_handle: Mutex<u64>,
}

impl HyprlandSurfaces {
    /// `window_class` identifies the settings window hidden during selection.
    pub fn new(window_class: Option<String>) -> Self {
        Self {
            window_class: window_class.filter(|class| !class.trim().is_empty()),
            ..Self::default()
        }
    }

    fn allocate_handle(&self) -> u64 {
        let mut next = self.next_handle.lock().unwrap_or_else(PoisonError::into_inner);
        *next += 1;
        *next
    }

    fn dispatch(&self, args: &[&str]) {
        match run_command_text("hyprctl", args) {
            Ok(reply) if reply.trim() == "ok" => {
                tracing::debug!(args = ?args, "hyprctl dispatch applied");
            }
            Ok(reply) => {
                tracing::debug!(args = ?args, reply = reply.trim(), "hyprctl dispatch rejected");
            }
            Err(err) => tracing::debug!(args = ?args, %err, "hyprctl dispatch failed"),
        }
    }
}

impl SelectionSurfaces for HyprlandSurfaces {
    fn present_surface(
        &self,
        display: &Display,
        reporter: SurfaceReporter,
    ) -> SelectionResult<SurfaceHandle> {
        let handle = self.allocate_handle();
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = run.as_mut() {
            if current.session == reporter.session() {
                current
                    .reporters
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(reporter);
                current.handles.push(handle);
                return Ok(SurfaceHandle(handle));
            }
            current.cancel.cancel();
        }

        let child = spawn_slurp().map_err(|err| SelectionError::Surface {
            display: display.name.clone(),
            message: err.to_string(),
        })?;
        let session = reporter.session();
        let cancel = reporter.cancellation().clone();
        let reporters: Reporters = Arc::new(Mutex::new(vec![reporter]));
        watch_slurp(child, reporters.clone(), cancel.clone());

        let output = display.name.as_str();
        tracing::debug!(output, session, "slurp selection started");
        *run = Some(SlurpRun {
            session,
            reporters,
            handles: vec![handle],
            cancel,
        });
        Ok(SurfaceHandle(handle))
    }

    fn close_surface(&self, handle: SurfaceHandle) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = run.as_mut() else {
            return;
        };
        current.handles.retain(|id| *id != handle.0);
        if current.handles.is_empty() {
            current.cancel.cancel();
            *run = None;
        }
    }

    fn foreground_focused(&self) -> bool {
        let Some(class) = self.window_class.as_deref() else {
            return false;
        };
        run_command_text("hyprctl", &["activewindow", "-j"])
            .ok()
            .and_then(|json| parse_active_window_class(&json))
            .is_some_and(|active| active == class)
    }

    fn hide_foreground(&self) {
        let Some(class) = self.window_class.as_deref() else {
            return;
        };
        let target = format!("{HIDDEN_WORKSPACE},{}", window_selector(class));
        self.dispatch(&["dispatch", "movetoworkspacesilent", &target]);
    }

    fn show_foreground(&self) {
        let Some(class) = self.window_class.as_deref() else {
            return;
        };
        let workspace = match run_command_text("hyprctl", &["monitors", "-j"])
            .map_err(DisplayError::from)
            .and_then(|json| parse_focused_workspace(&json))
        {
            Ok(workspace) => workspace,
            Err(err) => {
                tracing::warn!(%err, "cannot restore settings window without a focused workspace");
                return;
            }
        };
        let selector = window_selector(class);
        let target = format!("{workspace},{selector}");
        self.dispatch(&["dispatch", "movetoworkspace", &target]);
        self.dispatch(&["dispatch", "focuswindow", &selector]);
    }
}

fn window_selector(class: &str) -> String {
    format!("class:^({class})$")
}

fn spawn_slurp() -> std::io::Result<Child> {
    Command::new("slurp")
        .args(["-f", "%x %y %w %h"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
}

fn watch_slurp(mut child: Child, reporters: Reporters, cancel: CancellationToken) {
    std::thread::spawn(move || {
        let status = loop {
            if cancel.is_cancelled() {
                cleanup_command_child(&mut child);
                return;
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(SLURP_POLL_INTERVAL),
                Err(err) => {
                    tracing::warn!(?err, "failed to poll slurp");
                    cleanup_command_child(&mut child);
                    report_cancel(&reporters);
                    return;
                }
            }
        };

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            if let Err(err) = pipe.read_to_string(&mut stdout) {
                tracing::warn!(?err, "failed to read slurp output");
            }
        }

        let reporters = reporters.lock().unwrap_or_else(PoisonError::into_inner);
        if !status.success() {
            tracing::debug!(status = ?status.code(), "slurp dismissed");
            report_cancel_locked(&reporters);
            return;
        }
        let Some((x, y, width, height)) = parse_slurp_geometry(&stdout) else {
            tracing::warn!(output = stdout.trim(), "unparseable slurp output");
            report_cancel_locked(&reporters);
            return;
        };
        match route_to_display(&reporters, x, y) {
            Some(reporter) => {
                let origin = reporter.display().bounds;
                reporter.dragged(x - origin.x, y - origin.y, width, height);
            }
            None => report_cancel_locked(&reporters),
        }
    });
}

fn report_cancel(reporters: &Reporters) {
    let reporters = reporters.lock().unwrap_or_else(PoisonError::into_inner);
    report_cancel_locked(&reporters);
}

fn report_cancel_locked(reporters: &[SurfaceReporter]) {
    if let Some(reporter) = reporters.first() {
        reporter.cancelled();
    }
}

fn route_to_display(reporters: &[SurfaceReporter], x: i32, y: i32) -> Option<&SurfaceReporter> {
    reporters
        .iter()
        .find(|reporter| reporter.display().bounds.contains_point(x, y))
        .or_else(|| reporters.first())
}

/// Parses `"%x %y %w %h"` slurp output in global logical pixels.
fn parse_slurp_geometry(output: &str) -> Option<(i32, i32, i64, i64)> {
    let mut fields = output.split_whitespace();
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    let width = fields.next()?.parse().ok()?;
    let height = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((x, y, width, height))
}
