//! Command-line front end.
//!
//! Renders stored ink to PNG, prints routed wires as SVG path data, and
//! writes default configuration files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use docanvas_canvas::model::ScreenRect;
use docanvas_canvas::persistence::{FileStore, NodePersistence, StrokePersistence};
use docanvas_canvas::viewport::{ViewportState, ViewportTransform};
use docanvas_canvas::wires::Wire;
use docanvas_canvas::{DrawingSurface, NodeGraph, StrokeStore, WireRouter};
use docanvas_core::DocumentId;
use docanvas_settings::CanvasConfig;

#[derive(Debug, Parser)]
#[command(name = "docanvas", version, about = "Spatial annotation canvas tools")]
pub struct Cli {
    /// Configuration file (.json or .toml). Defaults to the user config path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a document's ink to a PNG file
    Render(RenderArgs),
    /// Print SVG path data for every routable wire
    Wires(WiresArgs),
    /// Manage configuration files
    Config {
        /// Write a default configuration to FILE
        #[arg(long, value_name = "FILE")]
        init: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Directory of a file-backed store
    #[arg(long)]
    pub store: PathBuf,

    /// Document id
    #[arg(long)]
    pub document: String,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: StoreArgs,

    /// Output PNG path
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, default_value_t = 1280.0)]
    pub width: f64,

    #[arg(long, default_value_t = 800.0)]
    pub height: f64,

    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    pub dpr: f64,

    #[arg(long, default_value_t = 1.0)]
    pub zoom: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan_x: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan_y: f64,
}

#[derive(Debug, Args)]
pub struct WiresArgs {
    #[command(flatten)]
    pub source: StoreArgs,

    /// JSON map of fragment id to `{x, y, width, height}` in screen pixels
    #[arg(long)]
    pub fragments: PathBuf,

    #[arg(long, default_value_t = 1.0)]
    pub zoom: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan_x: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pan_y: f64,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Config { init } => init_config(&init),
            Command::Render(args) => {
                let config = load_config(self.config.as_deref())?;
                render(&config, &args).await
            }
            Command::Wires(args) => {
                let config = load_config(self.config.as_deref())?;
                for wire in wires(&config, &args).await? {
                    println!("{} {} {}", wire.node_id, wire.fragment_id, wire.to_svg_path());
                }
                Ok(())
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CanvasConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => CanvasConfig::default_path()?,
    };
    let config = CanvasConfig::load_or_default(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    Ok(config)
}

fn viewport(zoom: f64, pan_x: f64, pan_y: f64) -> anyhow::Result<ViewportTransform> {
    let state = ViewportState { zoom, pan_x, pan_y };
    Ok(ViewportTransform::from_state(state)?)
}

/// Write a default configuration file.
pub fn init_config(path: &Path) -> anyhow::Result<()> {
    CanvasConfig::default()
        .save_to_file(path)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Render stored ink through the given viewport into a PNG.
pub async fn render(config: &CanvasConfig, args: &RenderArgs) -> anyhow::Result<()> {
    let document = DocumentId::new(args.source.document.clone());
    let store = FileStore::new(&args.source.store);
    let strokes = store
        .load_strokes(&document)
        .await
        .with_context(|| format!("loading strokes of {}", document))?;

    let mut ink = StrokeStore::from_settings(&config.drawing)?;
    ink.load(strokes);
    let mut surface = DrawingSurface::new(args.width, args.height, args.dpr)?;
    surface.render(&viewport(args.zoom, args.pan_x, args.pan_y)?, &ink);
    surface.save_png(&args.out)?;

    tracing::info!(
        "Rendered {} strokes of {} to {}",
        ink.strokes().len(),
        document,
        args.out.display()
    );
    Ok(())
}

/// Route wires for a stored document against a fragment layout file.
pub async fn wires(config: &CanvasConfig, args: &WiresArgs) -> anyhow::Result<Vec<Wire>> {
    let document = DocumentId::new(args.source.document.clone());
    let store = FileStore::new(&args.source.store);
    let nodes = store
        .load_nodes(&document)
        .await
        .with_context(|| format!("loading nodes of {}", document))?;

    let layout = tokio::fs::read_to_string(&args.fragments)
        .await
        .with_context(|| format!("reading {}", args.fragments.display()))?;
    let fragments: HashMap<String, ScreenRect> = serde_json::from_str(&layout)
        .with_context(|| format!("parsing {}", args.fragments.display()))?;

    let mut graph = NodeGraph::new(document, config.nodes.marker_size);
    graph.load(nodes)?;
    let mut router = WireRouter::new(&config.wires);
    let routed = router
        .route(&graph, &viewport(args.zoom, args.pan_x, args.pan_y)?, &fragments)
        .to_vec();
    tracing::debug!("{} of {} nodes have wires", routed.len(), graph.len());
    Ok(routed)
}
