pub mod app;
pub mod capture;
pub mod cli;
pub mod clipboard;
mod command;
pub mod config;
pub mod display;
pub mod error;
pub mod geometry;
pub mod hotkey;
pub mod logging;
pub mod macros;
pub mod notification;
pub mod orchestrator;
pub mod selection;
pub mod storage;
pub use error::{AppError, AppResult};
