//! # Event Bus Module
//!
//! Typed [`CanvasEvent`]s published by document sessions for whatever UI
//! layer hosts the canvas.
//!
//! Rendering and wire routing never depend on a subscriber being present;
//! the bus only mirrors what already happened.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docanvas_core::event_bus::{EventBus, EventCategory, EventFilter};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Viewport]),
//!     |event| println!("{}", event.description()),
//! );
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
