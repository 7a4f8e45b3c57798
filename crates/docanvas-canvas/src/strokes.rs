//! Freehand ink: committed strokes, the in-progress stroke, and undo/redo.
//!
//! The store is a small state machine. With a tool active, pointer-down seeds
//! a stroke (`Idle -> Drawing`), moves append world points, and release either
//! commits the stroke (two or more points) or discards it (`Drawing -> Idle`).
//! Starting a stroke clears the redo buffer, so redo is never available after
//! new ink.

use std::fmt;
use std::str::FromStr;

use docanvas_core::DrawingError;
use docanvas_settings::DrawingSettings;
use serde::{Deserialize, Serialize};

use crate::model::{Rgb, WorldPoint};

/// Drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pen,
    Highlighter,
    Eraser,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pen => write!(f, "pen"),
            Self::Highlighter => write!(f, "highlighter"),
            Self::Eraser => write!(f, "eraser"),
        }
    }
}

impl FromStr for Tool {
    type Err = DrawingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pen" => Ok(Self::Pen),
            "highlighter" => Ok(Self::Highlighter),
            "eraser" => Ok(Self::Eraser),
            other => Err(DrawingError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }
}

/// One freehand stroke in world coordinates.
///
/// `color` is kept for eraser strokes but never affects rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub tool: Tool,
    pub color: Rgb,
    pub width: f64,
    pub points: Vec<WorldPoint>,
}

impl Stroke {
    pub fn new(tool: Tool, color: Rgb, width: f64, points: Vec<WorldPoint>) -> Self {
        Self {
            tool,
            color,
            width,
            points,
        }
    }

    /// Whether the stroke has enough points to be committed.
    pub fn is_committable(&self) -> bool {
        self.points.len() > 1
    }
}

/// Width and opacity presets applied when a tool is picked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolPresets {
    pub highlighter_width: f64,
    pub eraser_width: f64,
    pub highlighter_opacity: f64,
}

impl Default for ToolPresets {
    fn default() -> Self {
        Self::from(&DrawingSettings::default())
    }
}

impl From<&DrawingSettings> for ToolPresets {
    fn from(settings: &DrawingSettings) -> Self {
        Self {
            highlighter_width: settings.highlighter_width,
            eraser_width: settings.eraser_width,
            highlighter_opacity: settings.highlighter_opacity,
        }
    }
}

/// Whether a stroke is being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeState {
    Idle,
    Drawing,
}

/// What happened when a stroke ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeOutcome {
    /// Added to the committed list.
    Committed,
    /// Too short; dropped.
    Discarded,
    /// No stroke was in progress.
    NotDrawing,
}

/// Committed ink plus undo/redo history for one document.
#[derive(Debug, Clone)]
pub struct StrokeStore {
    committed: Vec<Stroke>,
    redo_buffer: Vec<Stroke>,
    active_tool: Option<Tool>,
    color: Rgb,
    width: f64,
    in_progress: Option<Stroke>,
    presets: ToolPresets,
}

impl Default for StrokeStore {
    fn default() -> Self {
        Self {
            committed: Vec::new(),
            redo_buffer: Vec::new(),
            active_tool: None,
            color: Rgb::RED,
            width: 5.0,
            in_progress: None,
            presets: ToolPresets::default(),
        }
    }
}

impl StrokeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store configured from drawing settings.
    pub fn from_settings(settings: &DrawingSettings) -> Result<Self, DrawingError> {
        let mut store = Self {
            presets: ToolPresets::from(settings),
            ..Self::default()
        };
        store.set_color(settings.default_color.parse()?);
        store.set_width(settings.default_width)?;
        Ok(store)
    }

    pub fn state(&self) -> StrokeState {
        if self.in_progress.is_some() {
            StrokeState::Drawing
        } else {
            StrokeState::Idle
        }
    }

    pub fn active_tool(&self) -> Option<Tool> {
        self.active_tool
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn presets(&self) -> &ToolPresets {
        &self.presets
    }

    /// Committed strokes in drawing order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.committed
    }

    pub fn redo_buffer(&self) -> &[Stroke] {
        &self.redo_buffer
    }

    pub fn in_progress(&self) -> Option<&Stroke> {
        self.in_progress.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.committed.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_buffer.is_empty()
    }

    /// Pick a tool. Picking the active tool again turns drawing off.
    ///
    /// Highlighter and eraser apply their width preset; pen keeps the current
    /// width. Returns the tool now active. An in-progress stroke is discarded.
    pub fn select_tool(&mut self, tool: Tool) -> Option<Tool> {
        self.in_progress = None;
        if self.active_tool == Some(tool) {
            self.active_tool = None;
        } else {
            self.active_tool = Some(tool);
            match tool {
                Tool::Highlighter => self.width = self.presets.highlighter_width,
                Tool::Eraser => self.width = self.presets.eraser_width,
                Tool::Pen => {}
            }
        }
        tracing::debug!(
            "Active tool: {}",
            self.active_tool.map_or("none".to_string(), |t| t.to_string())
        );
        self.active_tool
    }

    /// Turn drawing off.
    pub fn clear_tool(&mut self) {
        self.active_tool = None;
        self.in_progress = None;
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    pub fn set_width(&mut self, width: f64) -> Result<(), DrawingError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(DrawingError::InvalidWidth { width });
        }
        self.width = width;
        Ok(())
    }

    /// Start a stroke at `point` with the active tool, color and width.
    pub fn begin(&mut self, point: WorldPoint) -> Result<(), DrawingError> {
        let tool = self.active_tool.ok_or(DrawingError::NoActiveTool)?;
        self.redo_buffer.clear();
        self.in_progress = Some(Stroke::new(tool, self.color, self.width, vec![point]));
        Ok(())
    }

    /// Append a point to the in-progress stroke. Returns false when idle.
    pub fn extend(&mut self, point: WorldPoint) -> bool {
        match self.in_progress.as_mut() {
            Some(stroke) => {
                stroke.points.push(point);
                true
            }
            None => false,
        }
    }

    /// Finish the in-progress stroke.
    pub fn end(&mut self) -> StrokeOutcome {
        let Some(stroke) = self.in_progress.take() else {
            return StrokeOutcome::NotDrawing;
        };
        if stroke.is_committable() {
            self.committed.push(stroke);
            self.redo_buffer.clear();
            StrokeOutcome::Committed
        } else {
            StrokeOutcome::Discarded
        }
    }

    /// Drop the in-progress stroke without committing it.
    pub fn cancel(&mut self) {
        self.in_progress = None;
    }

    /// Move the last committed stroke onto the redo buffer.
    pub fn undo(&mut self) -> bool {
        match self.committed.pop() {
            Some(stroke) => {
                self.redo_buffer.push(stroke);
                true
            }
            None => false,
        }
    }

    /// Move the last undone stroke back onto the committed list.
    pub fn redo(&mut self) -> bool {
        match self.redo_buffer.pop() {
            Some(stroke) => {
                self.committed.push(stroke);
                true
            }
            None => false,
        }
    }

    /// Replace all ink with strokes loaded from the store.
    ///
    /// Strokes with fewer than two points are dropped. History and any
    /// in-progress stroke are reset.
    pub fn load(&mut self, strokes: Vec<Stroke>) {
        let total = strokes.len();
        self.committed = strokes.into_iter().filter(Stroke::is_committable).collect();
        if self.committed.len() != total {
            tracing::debug!(
                "Dropped {} degenerate strokes on load",
                total - self.committed.len()
            );
        }
        self.redo_buffer.clear();
        self.in_progress = None;
    }
}
