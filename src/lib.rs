//! # DoCanvas
//!
//! A spatial annotation canvas laid over a rendered document:
//! - Infinite world plane with anchored pan and zoom
//! - Freehand ink (pen, highlighter, eraser) with undo/redo and debounced saves
//! - Knowledge nodes pinned to document fragments, connected by curved wires
//! - Fragment selection feeding a per-node chat conversation
//!
//! ## Architecture
//!
//! DoCanvas is organized as a workspace with multiple crates:
//!
//! 1. **docanvas-core** - Error types, identifiers, event bus, shared-state aliases
//! 2. **docanvas-settings** - Canvas configuration (JSON/TOML), validation, default paths
//! 3. **docanvas-canvas** - Viewport, ink, nodes, wires, gestures, persistence, sessions
//! 4. **docanvas** - Command-line front end that integrates all crates

pub mod cli;

pub use docanvas_canvas as canvas;
pub use docanvas_settings as settings;

pub use docanvas_core::{
    CanvasEvent, DocumentId, Error, EventBus, EventCategory, EventFilter, Result, SessionId,
};

pub use docanvas_canvas::{
    DocumentSession, DrawingSurface, FileStore, KnowledgeNode, NodeGraph, SessionManager,
    StrokeStore, ViewportTransform, WireRouter,
};

pub use docanvas_settings::CanvasConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Pretty formatting on stderr, so command output on stdout stays clean
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
