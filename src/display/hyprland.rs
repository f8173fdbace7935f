use serde::Deserialize;

use super::{Display, DisplayError};
use crate::geometry::Rect;

#[derive(Deserialize)]
struct MonitorStatus {
    #[serde(default)]
    focused: bool,
    name: Option<String>,
    x: Option<i32>,
    y: Option<i32>,
    width: Option<i32>,
    height: Option<i32>,
    #[serde(default)]
    scale: Option<f64>,
    #[serde(default)]
    transform: Option<i32>,
    #[serde(default)]
    disabled: Option<bool>,
    #[serde(default, rename = "activeWorkspace")]
    active_workspace: Option<WorkspaceStatus>,
}

#[derive(Deserialize)]
struct WorkspaceStatus {
    #[serde(default)]
    id: Option<i32>,
}

#[derive(Deserialize)]
struct ActiveWindowStatus {
    #[serde(default)]
    class: Option<String>,
}

fn normalize_monitor_dimension(value: Option<i32>) -> Option<u32> {
    value
        .and_then(|size| u32::try_from(size).ok())
        .filter(|size| *size > 0)
}

/// Hyprland reports physical pixels; selection and areas live in logical
/// pixels, so divide by the output scale and swap axes for rotated outputs.
fn logical_size(monitor: &MonitorStatus) -> Option<(u32, u32)> {
    let width = normalize_monitor_dimension(monitor.width)?;
    let height = normalize_monitor_dimension(monitor.height)?;
    let scale = monitor
        .scale
        .filter(|scale| scale.is_finite() && *scale > 0.0)
        .unwrap_or(1.0);
    let logical = |value: u32| ((f64::from(value) / scale).round() as u32).max(1);
    let (width, height) = (logical(width), logical(height));
    match monitor.transform.unwrap_or(0) % 2 {
        1 => Some((height, width)),
        _ => Some((width, height)),
    }
}

pub(super) fn parse_displays(monitors_json: &str) -> Result<Vec<Display>, DisplayError> {
    let monitors: Vec<MonitorStatus> =
        serde_json::from_str(monitors_json).map_err(|err| DisplayError::InvalidMonitorMetadata {
            message: err.to_string(),
        })?;

    let mut displays = Vec::new();
    for monitor in monitors {
        if monitor.disabled.unwrap_or(false) {
            continue;
        }
        let Some((width, height)) = logical_size(&monitor) else {
            tracing::warn!(name = ?monitor.name, "skipping monitor without usable dimensions");
            continue;
        };
        displays.push(Display {
            name: monitor
                .name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("monitor-{}", displays.len())),
            bounds: Rect::new(
                monitor.x.unwrap_or(0),
                monitor.y.unwrap_or(0),
                width,
                height,
            ),
        });
    }

    if displays.is_empty() {
        return Err(DisplayError::NoDisplays);
    }
    Ok(displays)
}

pub(crate) fn parse_focused_workspace(monitors_json: &str) -> Result<i32, DisplayError> {
    let monitors: Vec<MonitorStatus> =
        serde_json::from_str(monitors_json).map_err(|err| DisplayError::InvalidMonitorMetadata {
            message: err.to_string(),
        })?;
    monitors
        .into_iter()
        .find(|monitor| monitor.focused)
        .and_then(|monitor| monitor.active_workspace)
        .and_then(|workspace| workspace.id)
        .filter(|id| *id != 0)
        .ok_or_else(|| DisplayError::InvalidMonitorMetadata {
            message: "focused monitor missing active workspace id".to_string(),
        })
}

pub(crate) fn parse_active_window_class(active_window_json: &str) -> Option<String> {
    serde_json::from_str::<ActiveWindowStatus>(active_window_json)
        .ok()
        .and_then(|window| window.class)
        .map(|class| class.trim().to_string())
        .filter(|class| !class.is_empty())
}
