//! Settings errors.
//!
//! Failures that involve a file carry its path so the binary can report
//! them without extra context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, saving or validating a [`CanvasConfig`](crate::CanvasConfig).
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The file exists but does not decode as a config.
    #[error("Malformed config {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Cannot encode config: {0}")]
    Encode(String),

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The platform reports no per-user directory of this kind.
    #[error("No user {0} directory on this platform")]
    NoUserDirectory(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors about the shape of a config rather than the file holding it.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Only `.json` and `.toml` are understood.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Value out of range for '{key}': {value}")]
    ValueOutOfRange { key: String, value: String },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

impl From<SettingsError> for docanvas_core::Error {
    fn from(err: SettingsError) -> Self {
        docanvas_core::Error::other(err.to_string())
    }
}
