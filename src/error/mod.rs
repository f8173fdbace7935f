use crate::config::ConfigError;
use crate::hotkey::ShortcutError;
use crate::macros::MacroStoreError;
use crate::selection::SelectionError;
use crate::storage::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] MacroStoreError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Shortcut(#[from] ShortcutError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to install signal handler")]
    Signal(#[source] std::io::Error),
}
