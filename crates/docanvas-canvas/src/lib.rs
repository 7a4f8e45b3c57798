//! # DoCanvas Canvas
//!
//! The spatial canvas layered over a rendered document: an infinite world
//! plane that can be panned and zoomed, freehand ink drawn on it, knowledge
//! nodes pinned to document fragments, and wires connecting the two.
//!
//! ## Core Components
//!
//! - **Viewport**: the world/screen mapping every other layer renders through
//! - **Strokes**: tool state, in-progress stroke and undo/redo history
//! - **Surface**: DPR-aware raster target the ink is painted into
//! - **Nodes**: node graph, placement and hit testing
//! - **Wires**: cubic connectors from node markers to fragments
//! - **Gestures**: pointer and wheel dispatch (stroke, node drag, pan, pinch)
//! - **Selection / Conversation**: fragment pills, the chat panel and named chat threads
//! - **Persistence**: stroke, node and chat stores, local cache, debounced writes
//! - **Session**: per-document ownership and stale-response handling
//!
//! ## Architecture
//!
//! ```text
//! SessionManager
//!   └── DocumentSession
//!         ├── ViewportTransform
//!         ├── StrokeStore ──> DrawingSurface
//!         ├── NodeGraph ───> WireRouter
//!         ├── SelectionSet, Conversation, ChatHistory
//!         └── WriteQueue ──> StrokePersistence
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docanvas_canvas::{ViewportTransform, ScreenPoint};
//!
//! let mut viewport = ViewportTransform::new();
//! viewport.zoom_at(ScreenPoint::new(100.0, 100.0), 2.0);
//! let world = viewport.to_world(ScreenPoint::new(100.0, 100.0));
//! ```

pub mod conversation;
pub mod gestures;
pub mod input;
pub mod model;
pub mod nodes;
pub mod persistence;
pub mod selection;
pub mod session;
pub mod strokes;
pub mod surface;
pub mod viewport;
pub mod wires;

pub use conversation::{
    ChatHistory, ChatMessage, ChatReply, ChatRequest, ChatService, ChatSession, ContextScope,
    Conversation, MessageStatus, Role, ThinkingGuard, ThinkingIndicator,
    CHAT_UNAVAILABLE_PLACEHOLDER,
};
pub use gestures::{ActiveGesture, GestureDispatcher, GestureOutcome, GestureTargets};
pub use input::{
    FocusTarget, KeyEvent, Modifiers, PointerEvent, PointerKind, PointerType, Shortcut,
    ShortcutMap, WheelEvent,
};
pub use model::{Rgb, ScreenPoint, ScreenRect, WorldPoint};
pub use nodes::{CanvasPosition, KnowledgeNode, NodeGraph};
pub use persistence::{
    ChatHistoryPersistence, FileStore, LocalNodeCache, MemoryStore, NodePersistence,
    StrokePersistence, WriteQueue,
};
pub use selection::{SelectionEntry, SelectionSet};
pub use session::{
    AutoConfirm, Collaborators, ConfirmPrompt, DocumentSession, PendingChat, RequestTicket,
    SessionManager, SurfaceSize,
};
pub use strokes::{Stroke, StrokeOutcome, StrokeState, StrokeStore, Tool, ToolPresets};
pub use surface::DrawingSurface;
pub use viewport::{ViewportState, ViewportTransform};
pub use wires::{FragmentResolver, NoFragments, Wire, WireRouter};
