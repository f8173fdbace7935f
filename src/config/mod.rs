use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::macros::Hotkey;
use crate::storage::DEFAULT_FILE_PREFIX;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    MissingHomeDirectory,
    #[error("failed to create config directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize config")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write config {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

const APP_DIR: &str = "ft-capture";
const APP_CONFIG_FILE: &str = "config.json";
const MACROS_FILE: &str = "macros.json";
const PID_FILE: &str = "daemon.pid";

const DEFAULT_FEEDBACK_DURATION_MS: u64 = 1000;
const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 10_000;

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auto_save: bool,
    pub save_dir: Option<PathBuf>,
    pub file_prefix: String,
    pub feedback_duration_ms: u64,
    /// Watchdog around the screen grab; `0` waits forever.
    pub capture_timeout_ms: u64,
    pub settings_window_class: Option<String>,
    pub selection_hotkey: Option<Hotkey>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auto_save: false,
            save_dir: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            feedback_duration_ms: DEFAULT_FEEDBACK_DURATION_MS,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
            settings_window_class: None,
            selection_hotkey: None,
        }
    }
}

/// Where settings and macro definitions live, plus the pid file a running
/// daemon leaves next to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config: PathBuf,
    pub macros: PathBuf,
    pub pid: PathBuf,
}

impl AppPaths {
    /// Files under `config_dir` when given, otherwise under
    /// `$XDG_CONFIG_HOME/ft-capture` (or `$HOME/.config/ft-capture`).
    pub fn resolve(config_dir: Option<&Path>) -> ConfigResult<Self> {
        match config_dir {
            Some(dir) => Ok(Self::in_dir(dir)),
            None => {
                let (xdg_config_home, home) = config_env_dirs();
                Self::from_env(xdg_config_home.as_deref(), home.as_deref())
            }
        }
    }

    fn from_env(xdg_config_home: Option<&Path>, home: Option<&Path>) -> ConfigResult<Self> {
        Ok(Self {
            config: app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home)?,
            macros: app_config_path(APP_DIR, MACROS_FILE, xdg_config_home, home)?,
            pid: app_config_path(APP_DIR, PID_FILE, xdg_config_home, home)?,
        })
    }

    fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(APP_CONFIG_FILE),
            macros: dir.join(MACROS_FILE),
            pid: dir.join(PID_FILE),
        }
    }
}

pub fn load_app_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub fn save_app_config_to(config: &AppConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(?path, "config saved");
    Ok(())
}

/// Applies `change` to the settings currently on disk and writes them back,
/// so fields changed by another process are kept.
pub fn update_app_config_at(
    path: &Path,
    change: impl FnOnce(&mut AppConfig),
) -> ConfigResult<AppConfig> {
    let mut config = load_app_config_from(path);
    change(&mut config);
    save_app_config_to(&config, path)?;
    Ok(config)
}

fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> ConfigResult<PathBuf> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(xdg_config_home: Option<&Path>, home: Option<&Path>) -> ConfigResult<PathBuf> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "ft-capture-config-{}-{name}",
            std::process::id()
        ))
    }

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "ft-capture",
            "macros.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/config-root/ft-capture/macros.json"));
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("ft-capture", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/ft-capture/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("ft-capture", "config.json", None, None).unwrap_err();
        assert!(matches!(error, ConfigError::MissingHomeDirectory));
    }

    #[test]
    fn paths_resolve_under_explicit_dir() {
        let paths = AppPaths::resolve(Some(Path::new("/tmp/ft"))).unwrap();
        assert_eq!(paths.config, PathBuf::from("/tmp/ft/config.json"));
        assert_eq!(paths.macros, PathBuf::from("/tmp/ft/macros.json"));
        assert_eq!(paths.pid, PathBuf::from("/tmp/ft/daemon.pid"));
    }

    #[test]
    fn paths_from_env_share_the_app_dir() {
        let paths = AppPaths::from_env(None, Some(Path::new("/home/me"))).unwrap();
        assert_eq!(
            paths.macros,
            PathBuf::from("/home/me/.config/ft-capture/macros.json")
        );
        assert_eq!(paths.config.parent(), paths.macros.parent());
    }

    #[test]
    fn defaults_disable_auto_save() {
        let config = AppConfig::default();
        assert!(!config.auto_save);
        assert_eq!(config.feedback_duration_ms, 1000);
        assert_eq!(config.file_prefix, "ft-capture");
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"auto_save": true, "selection_hotkey": "shift+ctrl+a"}"#)
                .unwrap();

        assert!(config.auto_save);
        assert_eq!(config.capture_timeout_ms, 10_000);
        assert_eq!(config.selection_hotkey.unwrap().as_str(), "Ctrl+Shift+A");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = temp_path("malformed.json");
        std::fs::write(&path, "{not json").unwrap();

        assert_eq!(load_app_config_from(&path), AppConfig::default());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = temp_path("saved");
        let path = dir.join("config.json");
        let config = AppConfig {
            auto_save: true,
            save_dir: Some(PathBuf::from("/tmp/captures")),
            ..AppConfig::default()
        };

        save_app_config_to(&config, &path).unwrap();

        assert_eq!(load_app_config_from(&path), config);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn update_keeps_fields_changed_on_disk() {
        let dir = temp_path("update");
        let path = dir.join("config.json");
        let external = AppConfig {
            file_prefix: "shots".to_string(),
            ..AppConfig::default()
        };
        save_app_config_to(&external, &path).unwrap();

        let updated = update_app_config_at(&path, |config| config.auto_save = true).unwrap();

        assert!(updated.auto_save);
        assert_eq!(updated.file_prefix, "shots");
        assert_eq!(load_app_config_from(&path), updated);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
