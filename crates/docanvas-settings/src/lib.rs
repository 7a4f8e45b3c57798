//! DoCanvas Settings Crate
//!
//! Handles canvas configuration: drawing presets, viewport gestures, node and
//! wire geometry, and the local cache location.

pub mod config;
pub mod error;

pub use config::{
    CacheSettings, CanvasConfig, DrawingSettings, NodeSettings, ViewportSettings, WireSettings,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
