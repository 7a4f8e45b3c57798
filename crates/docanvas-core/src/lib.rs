//! # DoCanvas Core
//!
//! Core types and utilities for DoCanvas.
//! Provides the error taxonomy, shared identifiers, the canvas event bus,
//! and shared-state aliases used by the canvas engine.

pub mod error;
pub mod event_bus;
pub mod ids;
pub mod types;

pub use error::{ChatError, DrawingError, Error, NodeError, PersistenceError, Result, ViewportError};

pub use event_bus::{
    CanvasEvent, DrawingEvent, EventBus, EventCategory, EventFilter, NodeEvent,
    PersistenceEvent, SelectionEvent, SessionEvent, SubscriptionId, ViewportEvent,
};

pub use ids::{DocumentId, SessionId};

pub use types::{thread_safe_none, thread_safe_rw, ThreadSafeOption, ThreadSafeRw, ThreadSafeRwMap};
