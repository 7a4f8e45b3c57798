//! Type aliases for commonly used shared-state types.
//!
//! Async persistence tasks and the event bus share small pieces of state with
//! the session that spawned them. These aliases name those shapes once.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe optional slot, e.g. a pending write that may already be taken.
///
/// Uses `parking_lot::Mutex` for better performance than `std::sync::Mutex`.
pub type ThreadSafeOption<T> = Arc<Mutex<Option<T>>>;

/// A thread-safe read-write lock wrapper for read-heavy state.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// A read-write locked hash map (subscription registries).
pub type ThreadSafeRwMap<K, V> = ThreadSafeRw<HashMap<K, V>>;

/// Creates a new `ThreadSafeOption<T>` initialized to `None`.
#[inline]
pub fn thread_safe_none<T>() -> ThreadSafeOption<T> {
    Arc::new(Mutex::new(None))
}

/// Creates a new `ThreadSafeRw<T>` from a value.
#[inline]
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}
