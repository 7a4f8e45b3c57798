//! Error handling for DoCanvas
//!
//! Provides error types for every layer of the canvas engine:
//! - Viewport errors (transform invariants)
//! - Drawing errors (tool parameters, stroke data)
//! - Node errors (knowledge node lookup and mutation)
//! - Persistence errors (remote store and local cache)
//! - Chat errors (request validation and transport)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Viewport error type
///
/// Raised when a transform update would break the `zoom > 0 && finite` invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewportError {
    /// Zoom factor is zero, negative, or not finite
    #[error("Invalid zoom {zoom}: zoom must be positive and finite")]
    InvalidZoom {
        /// The rejected zoom value.
        zoom: f64,
    },

    /// Scale factor passed to an anchored zoom is unusable
    #[error("Invalid scale factor {factor}")]
    InvalidScaleFactor {
        /// The rejected factor.
        factor: f64,
    },

    /// Pan offset is not finite
    #[error("Invalid pan offset ({x}, {y})")]
    InvalidPan {
        /// Horizontal offset.
        x: f64,
        /// Vertical offset.
        y: f64,
    },
}

/// Drawing error type
///
/// Represents invalid tool parameters or malformed stroke data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrawingError {
    /// Stroke width must be positive and finite
    #[error("Invalid stroke width {width}")]
    InvalidWidth {
        /// The rejected width.
        width: f64,
    },

    /// Color string could not be parsed
    #[error("Invalid color '{value}': expected #RRGGBB")]
    InvalidColor {
        /// The rejected color string.
        value: String,
    },

    /// Unknown drawing tool name
    #[error("Unknown drawing tool '{name}'")]
    UnknownTool {
        /// The rejected tool name.
        name: String,
    },

    /// Pointer input arrived while no tool is active
    #[error("No drawing tool is active")]
    NoActiveTool,
}

/// Knowledge node error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    /// No node with the given id
    #[error("Node {node_id} not found")]
    NotFound {
        /// The missing node id.
        node_id: String,
    },

    /// Node was created for another document
    #[error("Node {node_id} belongs to document {document_id}")]
    WrongDocument {
        /// The node id.
        node_id: String,
        /// The owning document.
        document_id: String,
    },

    /// Fragment a node should be placed on is not laid out
    #[error("Fragment {fragment_id} is not on screen")]
    FragmentNotFound {
        /// The unresolved fragment id.
        fragment_id: String,
    },
}

/// Persistence error type
///
/// Represents failures of the remote store or of the local durable cache.
#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    /// Remote store is unreachable or rejected the request
    #[error("Remote store unavailable: {reason}")]
    Unavailable {
        /// Transport-level reason.
        reason: String,
    },

    /// Stored file exists but could not be parsed; it is left untouched
    #[error("Malformed store file {path}: {reason}")]
    Malformed {
        /// Path of the unreadable file.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// Local cache could not be read or written
    #[error("Local cache error: {reason}")]
    Cache {
        /// The reason for the cache failure.
        reason: String,
    },
}

/// Chat error type
///
/// Represents request validation failures and transport failures of the chat collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Custom character range is empty, reversed, or outside the document
    #[error("Invalid character range {start}..{end}: end must be greater than start and within {total} characters")]
    InvalidRange {
        /// Requested start offset.
        start: i64,
        /// Requested end offset.
        end: i64,
        /// Document length in characters.
        total: usize,
    },

    /// Nothing to send
    #[error("Message is empty and no fragments are selected")]
    EmptyMessage,

    /// Chat service failed
    #[error("Chat service unavailable: {reason}")]
    Unavailable {
        /// Transport-level reason.
        reason: String,
    },
}

/// Main error type for DoCanvas
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Viewport error
    #[error(transparent)]
    Viewport(#[from] ViewportError),

    /// Drawing error
    #[error(transparent)]
    Drawing(#[from] DrawingError),

    /// Node error
    #[error(transparent)]
    Node(#[from] NodeError),

    /// Persistence error
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Chat error
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a persistence error
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }

    /// Check if this is a chat error
    pub fn is_chat_error(&self) -> bool {
        matches!(self, Error::Chat(_))
    }

    /// Check if this error was caused by invalid user input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::Chat(ChatError::InvalidRange { .. } | ChatError::EmptyMessage)
                | Error::Drawing(DrawingError::InvalidWidth { .. } | DrawingError::InvalidColor { .. })
                | Error::Viewport(_)
        )
    }

    /// Check if the error is a transient transport failure worth degrading over
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Persistence(PersistenceError::Unavailable { .. })
                | Error::Chat(ChatError::Unavailable { .. })
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
