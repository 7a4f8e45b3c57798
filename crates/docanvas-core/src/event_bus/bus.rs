//! Per-session-manager event bus.
//!
//! Handlers run synchronously on the publishing thread. Viewport changes can
//! be coalesced while a pan or pinch is in progress: only the latest
//! `ViewportEvent::Changed` is delivered once coalescing ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use super::events::{CanvasEvent, EventCategory, ViewportEvent};
use crate::types::{thread_safe_none, thread_safe_rw, ThreadSafeOption, ThreadSafeRwMap};

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.simple().to_string()[..8])
    }
}

/// Which events a handler wants.
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    #[default]
    All,
    /// Any of these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    pub fn matches(&self, event: &CanvasEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

type EventHandler = Box<dyn Fn(CanvasEvent) + Send + Sync>;

/// Fans canvas events out to UI observers.
pub struct EventBus {
    handlers: ThreadSafeRwMap<SubscriptionId, (EventFilter, EventHandler)>,
    coalescing_viewport: AtomicBool,
    held_viewport: ThreadSafeOption<CanvasEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: thread_safe_rw(HashMap::new()),
            coalescing_viewport: AtomicBool::new(false),
            held_viewport: thread_safe_none(),
        }
    }

    /// Deliver `event` to every matching handler.
    ///
    /// Returns the number of handlers reached. A viewport change held back by
    /// coalescing reaches none.
    pub fn publish(&self, event: CanvasEvent) -> usize {
        if self.coalescing_viewport.load(Ordering::SeqCst)
            && matches!(event, CanvasEvent::Viewport(ViewportEvent::Changed { .. }))
        {
            *self.held_viewport.lock() = Some(event);
            return 0;
        }
        self.deliver(event)
    }

    fn deliver(&self, event: CanvasEvent) -> usize {
        tracing::trace!("event: {}", event.description());
        let handlers = self.handlers.read();
        let mut reached = 0;
        for (filter, handler) in handlers.values() {
            if filter.matches(&event) {
                handler(event.clone());
                reached += 1;
            }
        }
        reached
    }

    /// Start or stop coalescing viewport changes.
    ///
    /// Stopping delivers the last change held back, if any.
    pub fn set_viewport_coalescing(&self, on: bool) {
        let was = self.coalescing_viewport.swap(on, Ordering::SeqCst);
        if was && !on {
            let held = self.held_viewport.lock().take();
            if let Some(event) = held {
                self.deliver(event);
            }
        }
    }

    pub fn is_coalescing_viewport(&self) -> bool {
        self.coalescing_viewport.load(Ordering::SeqCst)
    }

    /// Register a handler. It runs on the publishing thread and must return
    /// quickly.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(CanvasEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.handlers.write().insert(id, (filter, Box::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Returns true if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.write().remove(&id).is_some()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.handlers.read().len())
            .field("coalescing_viewport", &self.is_coalescing_viewport())
            .finish()
    }
}
