//! Runs one capture for a macro: lookup, screen grab, crop, clipboard,
//! optional auto-save and feedback, strictly in that order.
//!
//! Slow steps run on the blocking pool, so concurrent captures for different
//! macros proceed independently. Failures end up in [`CaptureOutcome`] and a
//! user notification; nothing here returns `Err`.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use image::RgbaImage;
use thiserror::Error;
use tokio::task::JoinError;

use crate::capture::{crop, CaptureBackend, CaptureError, GrimCaptureBackend};
use crate::clipboard::{ClipboardBackend, ClipboardError, WlCopyBackend};
use crate::config::AppConfig;
use crate::display::{primary_display, DisplayError, DisplaySource, HyprlandDisplays};
use crate::geometry::Rect;
use crate::macros::{MacroId, MacroStore};
use crate::notification::{CaptureFeedback, DesktopNotifier, Notifier, APP_NAME};
use crate::storage::{
    default_save_dir, FileBackend, FsBackend, StorageError, StorageResult, StorageService,
};

/// Why a step of a capture did not produce its result.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Displays(#[from] DisplayError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("selected area lies outside the captured screen")]
    EmptyCrop,
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("background task failed: {0}")]
    Join(#[from] JoinError),
}

pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Disabled,
    Saved(PathBuf),
    /// The clipboard copy still succeeded.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured { save: SaveOutcome },
    NotFound,
    NoArea { name: String },
    CaptureUnavailable { reason: String },
    ClipboardFailed { reason: String },
}

impl CaptureOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub auto_save: bool,
    pub save_dir: PathBuf,
    pub file_prefix: String,
    pub feedback_duration: Duration,
    pub capture_timeout: Option<Duration>,
}

impl CaptureSettings {
    pub fn from_config(config: &AppConfig) -> StorageResult<Self> {
        let save_dir = match &config.save_dir {
            Some(dir) => dir.clone(),
            None => default_save_dir()?,
        };
        Ok(Self {
            auto_save: config.auto_save,
            save_dir,
            file_prefix: config.file_prefix.clone(),
            feedback_duration: Duration::from_millis(config.feedback_duration_ms),
            capture_timeout: (config.capture_timeout_ms > 0)
                .then(|| Duration::from_millis(config.capture_timeout_ms)),
        })
    }
}

/// The OS-facing services a capture touches.
#[derive(Clone)]
pub struct Collaborators {
    pub displays: Arc<dyn DisplaySource>,
    pub capture: Arc<dyn CaptureBackend>,
    pub clipboard: Arc<dyn ClipboardBackend>,
    pub files: Arc<dyn FileBackend>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Hyprland, grim, wl-copy and desktop notifications.
    pub fn system(notification_timeout: Duration) -> Self {
        Self {
            displays: Arc::new(HyprlandDisplays),
            capture: Arc::new(GrimCaptureBackend),
            clipboard: Arc::new(WlCopyBackend),
            files: Arc::new(FsBackend),
            notifier: Arc::new(DesktopNotifier::new(notification_timeout)),
        }
    }
}

pub struct CaptureOrchestrator {
    store: Arc<MacroStore>,
    services: Collaborators,
    settings: RwLock<CaptureSettings>,
}

impl CaptureOrchestrator {
    pub fn new(store: Arc<MacroStore>, services: Collaborators, settings: CaptureSettings) -> Self {
        Self {
            store,
            services,
            settings: RwLock::new(settings),
        }
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_auto_save(&self, enabled: bool) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .auto_save = enabled;
        tracing::info!(enabled, "auto-save updated");
    }

    pub fn set_save_dir(&self, dir: PathBuf) {
        tracing::info!(dir = %dir.display(), "save directory updated");
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .save_dir = dir;
    }

    pub fn replace_settings(&self, settings: CaptureSettings) {
        *self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.services.notifier.clone()
    }

    pub async fn capture(&self, id: MacroId) -> CaptureOutcome {
        let Some(item) = self.store.get(id) else {
            tracing::warn!(%id, "capture requested for unknown macro");
            self.notify("Macro not found!").await;
            return CaptureOutcome::NotFound;
        };
        let Some(area) = item.area else {
            tracing::warn!(%id, name = %item.name, "capture requested for macro without area");
            self.notify(&format!("Macro \"{}\" has no area assigned!", item.name))
                .await;
            return CaptureOutcome::NoArea { name: item.name };
        };
        let settings = self.settings();

        let cropped = match self.grab_and_crop(area, settings.capture_timeout).await {
            Ok(cropped) => Arc::new(cropped),
            Err(err) => {
                tracing::warn!(%id, %err, "capture unavailable");
                self.notify(&format!("Capture failed: {err}")).await;
                return CaptureOutcome::CaptureUnavailable {
                    reason: err.to_string(),
                };
            }
        };

        let clipboard = self.services.clipboard.clone();
        let image = cropped.clone();
        if let Err(err) = run_blocking(move || Ok(clipboard.write_image(&image)?)).await {
            tracing::warn!(%id, %err, "clipboard write failed");
            self.notify(&format!("Capture failed: {err}")).await;
            return CaptureOutcome::ClipboardFailed {
                reason: err.to_string(),
            };
        }

        let save = if settings.auto_save {
            self.save(&item.name, cropped.clone(), &settings).await
        } else {
            SaveOutcome::Disabled
        };

        let feedback = CaptureFeedback {
            macro_id: item.id,
            name: item.name.clone(),
            color: item.color,
            area,
            duration: settings.feedback_duration,
        };
        let notifier = self.services.notifier.clone();
        if let Err(err) =
            tokio::task::spawn_blocking(move || notifier.capture_feedback(&feedback)).await
        {
            tracing::debug!(%err, "capture feedback task failed");
        }

        tracing::info!(
            %id,
            name = %item.name,
            width = cropped.width(),
            height = cropped.height(),
            "capture copied to clipboard"
        );
        CaptureOutcome::Captured { save }
    }

    /// Grabs the primary output and crops `area` out of it. Areas are kept in
    /// the primary display's logical space, so the bitmap must cover exactly
    /// that output for the scale factor to hold.
    async fn grab_and_crop(
        &self,
        area: Rect,
        timeout: Option<Duration>,
    ) -> OrchestratorResult<RgbaImage> {
        let displays = self.services.displays.clone();
        let capture = self.services.capture.clone();
        let grab = run_blocking(move || {
            let listed = displays.list_displays()?;
            let primary = primary_display(&listed).ok_or(DisplayError::NoDisplays)?;
            let bitmap = capture.capture_display(primary)?;
            let cropped = crop(&bitmap, primary.bounds.width, area);
            if cropped.width() == 0 || cropped.height() == 0 {
                return Err(OrchestratorError::EmptyCrop);
            }
            Ok(cropped)
        });

        match timeout {
            Some(limit) => tokio::time::timeout(limit, grab).await.unwrap_or_else(|_| {
                let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                Err(CaptureError::TimedOut { millis }.into())
            }),
            None => grab.await,
        }
    }

    async fn save(
        &self,
        name: &str,
        image: Arc<RgbaImage>,
        settings: &CaptureSettings,
    ) -> SaveOutcome {
        let storage = StorageService::with_paths(
            self.services.files.clone(),
            settings.save_dir.clone(),
            &settings.file_prefix,
        );
        let name = name.to_string();
        let saved = run_blocking(move || Ok(storage.save_capture(&name, &image)?)).await;

        match saved {
            Ok(path) => SaveOutcome::Saved(path),
            Err(err) => {
                tracing::warn!(%err, "auto-save failed; clipboard copy kept");
                self.notify(&format!("Save failed: {err}")).await;
                SaveOutcome::Failed(err.to_string())
            }
        }
    }

    async fn notify(&self, body: &str) {
        let notifier = self.services.notifier.clone();
        let body = body.to_string();
        if let Err(err) =
            tokio::task::spawn_blocking(move || notifier.notify(APP_NAME, &body)).await
        {
            tracing::debug!(%err, "notification task failed");
        }
    }
}

async fn run_blocking<T, F>(job: F) -> OrchestratorResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> OrchestratorResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job).await?
}
