//! Event type definitions for the event bus.
//!
//! This module defines all canvas events organized by category.
//! Events are designed to be cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{DocumentId, SessionId};

/// Root event enum for all canvas events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CanvasEvent {
    /// Pan and zoom changes
    Viewport(ViewportEvent),
    /// Freehand ink changes
    Drawing(DrawingEvent),
    /// Knowledge node changes
    Node(NodeEvent),
    /// Fragment selection changes
    Selection(SelectionEvent),
    /// Document session lifecycle
    Session(SessionEvent),
    /// Persistence outcomes
    Persistence(PersistenceEvent),
}

impl CanvasEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            CanvasEvent::Viewport(_) => EventCategory::Viewport,
            CanvasEvent::Drawing(_) => EventCategory::Drawing,
            CanvasEvent::Node(_) => EventCategory::Node,
            CanvasEvent::Selection(_) => EventCategory::Selection,
            CanvasEvent::Session(_) => EventCategory::Session,
            CanvasEvent::Persistence(_) => EventCategory::Persistence,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            CanvasEvent::Viewport(e) => e.description(),
            CanvasEvent::Drawing(e) => e.description(),
            CanvasEvent::Node(e) => e.description(),
            CanvasEvent::Selection(e) => e.description(),
            CanvasEvent::Session(e) => e.description(),
            CanvasEvent::Persistence(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Pan and zoom events.
    Viewport,
    /// Ink events.
    Drawing,
    /// Knowledge node events.
    Node,
    /// Selection events.
    Selection,
    /// Session lifecycle events.
    Session,
    /// Persistence events.
    Persistence,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Viewport => write!(f, "Viewport"),
            EventCategory::Drawing => write!(f, "Drawing"),
            EventCategory::Node => write!(f, "Node"),
            EventCategory::Selection => write!(f, "Selection"),
            EventCategory::Session => write!(f, "Session"),
            EventCategory::Persistence => write!(f, "Persistence"),
        }
    }
}

/// Viewport events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ViewportEvent {
    /// Pan or zoom changed.
    Changed {
        /// Zoom factor after the change.
        zoom: f64,
        /// Horizontal pan after the change.
        pan_x: f64,
        /// Vertical pan after the change.
        pan_y: f64,
    },
    /// Output surface was resized.
    Resized {
        /// Logical width.
        width: f64,
        /// Logical height.
        height: f64,
        /// Device pixel ratio.
        device_pixel_ratio: f64,
    },
}

impl ViewportEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            ViewportEvent::Changed { zoom, pan_x, pan_y } => {
                format!("Viewport zoom {:.0}% pan ({:.1}, {:.1})", zoom * 100.0, pan_x, pan_y)
            }
            ViewportEvent::Resized {
                width,
                height,
                device_pixel_ratio,
            } => format!("Surface resized to {}x{} @{}x", width, height, device_pixel_ratio),
        }
    }
}

/// Drawing events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DrawingEvent {
    /// Active tool changed (None = drawing off).
    ToolChanged {
        /// Tool name, if any.
        tool: Option<String>,
    },
    /// A stroke was committed.
    StrokeCommitted {
        /// Committed stroke count after the commit.
        committed: usize,
    },
    /// A single-point tap was discarded.
    StrokeDiscarded,
    /// Last stroke undone.
    Undone {
        /// Committed stroke count.
        committed: usize,
        /// Redo buffer length.
        redo: usize,
    },
    /// Last undone stroke restored.
    Redone {
        /// Committed stroke count.
        committed: usize,
        /// Redo buffer length.
        redo: usize,
    },
    /// Strokes were replaced by a load.
    Loaded {
        /// Loaded stroke count.
        count: usize,
    },
}

impl DrawingEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            DrawingEvent::ToolChanged { tool } => match tool {
                Some(tool) => format!("Tool: {}", tool),
                None => "Drawing off".to_string(),
            },
            DrawingEvent::StrokeCommitted { committed } => {
                format!("Stroke committed ({} total)", committed)
            }
            DrawingEvent::StrokeDiscarded => "Tap discarded".to_string(),
            DrawingEvent::Undone { committed, redo } => {
                format!("Undo ({} committed, {} redo)", committed, redo)
            }
            DrawingEvent::Redone { committed, redo } => {
                format!("Redo ({} committed, {} redo)", committed, redo)
            }
            DrawingEvent::Loaded { count } => format!("Loaded {} strokes", count),
        }
    }
}

/// Knowledge node events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeEvent {
    /// Node created.
    Created {
        /// New node id.
        node_id: Uuid,
        /// Fragment the node is bound to.
        fragment_id: String,
    },
    /// Node position changed (drag in progress or finished).
    Moved {
        /// Node id.
        node_id: Uuid,
        /// World x.
        x: f64,
        /// World y.
        y: f64,
    },
    /// Node conversation changed.
    ConversationUpdated {
        /// Node id.
        node_id: Uuid,
        /// Message count after the update.
        messages: usize,
    },
    /// Node deleted.
    Deleted {
        /// Node id.
        node_id: Uuid,
    },
    /// Nodes were replaced by a load.
    Loaded {
        /// Loaded node count.
        count: usize,
    },
}

impl NodeEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            NodeEvent::Created {
                node_id,
                fragment_id,
            } => format!("Node {} created on {}", node_id, fragment_id),
            NodeEvent::Moved { node_id, x, y } => {
                format!("Node {} moved to ({:.1}, {:.1})", node_id, x, y)
            }
            NodeEvent::ConversationUpdated { node_id, messages } => {
                format!("Node {} conversation: {} messages", node_id, messages)
            }
            NodeEvent::Deleted { node_id } => format!("Node {} deleted", node_id),
            NodeEvent::Loaded { count } => format!("Loaded {} nodes", count),
        }
    }
}

/// Selection events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectionEvent {
    /// Selection contents changed.
    Changed {
        /// Selected fragment ids in selection order.
        fragment_ids: Vec<String>,
    },
}

impl SelectionEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            SelectionEvent::Changed { fragment_ids } => {
                format!("Selection: {} fragments", fragment_ids.len())
            }
        }
    }
}

/// Session lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session opened for a document.
    Opened {
        /// Session id.
        session: SessionId,
        /// Document id.
        document: DocumentId,
    },
    /// Session flushed and closed.
    Closed {
        /// Session id.
        session: SessionId,
        /// Document id.
        document: DocumentId,
    },
    /// The chat panel switched to another named chat thread.
    ChatSwitched {
        /// Chat thread id.
        chat_id: Uuid,
        /// Display name.
        name: String,
    },
    /// A response arrived for a session that is no longer active.
    StaleResponseDiscarded {
        /// Session that issued the request.
        session: SessionId,
        /// What kind of response was dropped.
        what: String,
    },
}

impl SessionEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            SessionEvent::Opened { session, document } => {
                format!("{} opened for {}", session, document)
            }
            SessionEvent::Closed { session, document } => {
                format!("{} closed for {}", session, document)
            }
            SessionEvent::ChatSwitched { name, .. } => format!("Switched to {}", name),
            SessionEvent::StaleResponseDiscarded { session, what } => {
                format!("Discarded stale {} for {}", what, session)
            }
        }
    }
}

/// Persistence events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PersistenceEvent {
    /// A write reached the remote store.
    Saved {
        /// What was written.
        what: String,
    },
    /// A write failed and the feature degraded.
    SaveFailed {
        /// What was being written.
        what: String,
        /// Failure reason.
        reason: String,
    },
    /// A node was written to the local cache instead of the remote store.
    CachedLocally {
        /// Node id.
        node_id: Uuid,
    },
}

impl PersistenceEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            PersistenceEvent::Saved { what } => format!("Saved {}", what),
            PersistenceEvent::SaveFailed { what, reason } => {
                format!("Saving {} failed: {}", what, reason)
            }
            PersistenceEvent::CachedLocally { node_id } => {
                format!("Node {} cached locally", node_id)
            }
        }
    }
}
