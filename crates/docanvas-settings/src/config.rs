//! Configuration management for DoCanvas
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats stored in platform-specific directories.
//!
//! Configuration is organized into logical sections:
//! - Drawing presets (default ink, tool widths, save debounce)
//! - Viewport gestures (wheel sensitivity, initial pan)
//! - Node marker geometry
//! - Wire control offsets
//! - Local cache location

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, SettingsError, SettingsResult};

const APP_DIR: &str = "docanvas";

/// Freehand drawing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingSettings {
    /// Initial pen color as `#RRGGBB`
    pub default_color: String,
    /// Initial pen width in world units
    pub default_width: f64,
    /// Width applied when the highlighter is selected
    pub highlighter_width: f64,
    /// Width applied when the eraser is selected
    pub eraser_width: f64,
    /// Highlighter opacity (0, 1]
    pub highlighter_opacity: f64,
    /// Quiet period before strokes are written to the store
    pub save_debounce_ms: u64,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        Self {
            default_color: "#FF0000".to_string(),
            default_width: 5.0,
            highlighter_width: 30.0,
            eraser_width: 25.0,
            highlighter_opacity: 0.5,
            save_debounce_ms: 1500,
        }
    }
}

impl DrawingSettings {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

/// Viewport gesture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    /// Multiplier applied to wheel delta for modifier+wheel zoom
    pub wheel_zoom_sensitivity: f64,
    /// Horizontal pan when a document opens
    pub initial_pan_x: f64,
    /// Vertical pan when a document opens
    pub initial_pan_y: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            wheel_zoom_sensitivity: 0.001,
            initial_pan_x: 0.0,
            initial_pan_y: 0.0,
        }
    }
}

/// Knowledge node marker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Marker edge length in world units
    pub marker_size: f64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self { marker_size: 28.0 }
    }
}

/// Wire routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireSettings {
    /// Horizontal control offset leaving the node
    pub node_offset: f64,
    /// Horizontal control offset entering the fragment
    pub fragment_offset: f64,
}

impl Default for WireSettings {
    fn default() -> Self {
        Self {
            node_offset: 50.0,
            fragment_offset: 150.0,
        }
    }
}

/// Local durable cache settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Override for the node cache directory
    pub directory: Option<PathBuf>,
}

/// Complete canvas configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Drawing presets
    pub drawing: DrawingSettings,
    /// Viewport gestures
    pub viewport: ViewportSettings,
    /// Node markers
    pub nodes: NodeSettings,
    /// Wire geometry
    pub wires: WireSettings,
    /// Local cache
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_for(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
    }
}

impl CanvasConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_for(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let malformed = |reason: String| SettingsError::Malformed {
            path: path.to_path_buf(),
            reason,
        };
        let config: Self = match format {
            Format::Json => serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?,
            Format::Toml => toml::from_str(&content).map_err(|e| malformed(e.to_string()))?,
        };

        config.validate()?;
        tracing::debug!("Loaded canvas config from {}", path.display());
        Ok(config)
    }

    /// Load config from file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = format_for(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            Format::Toml => toml::to_string_pretty(self).map_err(|e| e.to_string()),
        }
        .map_err(SettingsError::Encode)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let d = &self.drawing;
        if !is_hex_color(&d.default_color) {
            return Err(invalid("drawing.default_color", "expected #RRGGBB"));
        }
        for (key, width) in [
            ("drawing.default_width", d.default_width),
            ("drawing.highlighter_width", d.highlighter_width),
            ("drawing.eraser_width", d.eraser_width),
        ] {
            if !(width.is_finite() && width > 0.0) {
                return Err(invalid(key, "width must be > 0"));
            }
        }
        if !(d.highlighter_opacity > 0.0 && d.highlighter_opacity <= 1.0) {
            return Err(ConfigError::ValueOutOfRange {
                key: "drawing.highlighter_opacity".to_string(),
                value: d.highlighter_opacity.to_string(),
            }
            .into());
        }

        let v = &self.viewport;
        if !(v.wheel_zoom_sensitivity.is_finite() && v.wheel_zoom_sensitivity > 0.0) {
            return Err(invalid("viewport.wheel_zoom_sensitivity", "must be > 0"));
        }
        if !(v.initial_pan_x.is_finite() && v.initial_pan_y.is_finite()) {
            return Err(invalid("viewport.initial_pan", "must be finite"));
        }

        if !(self.nodes.marker_size.is_finite() && self.nodes.marker_size > 0.0) {
            return Err(invalid("nodes.marker_size", "must be > 0"));
        }

        if !(self.wires.node_offset.is_finite() && self.wires.fragment_offset.is_finite()) {
            return Err(invalid("wires", "offsets must be finite"));
        }

        Ok(())
    }

    /// Default config file location (`<config dir>/docanvas/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("config.toml"))
            .ok_or(SettingsError::NoUserDirectory("config"))
    }

    /// Directory holding the local node cache
    ///
    /// Uses the configured override, otherwise `<cache dir>/docanvas/nodes`.
    pub fn cache_dir(&self) -> SettingsResult<PathBuf> {
        if let Some(dir) = &self.cache.directory {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join(APP_DIR).join("nodes"))
            .ok_or(SettingsError::NoUserDirectory("cache"))
    }
}

fn invalid(key: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
