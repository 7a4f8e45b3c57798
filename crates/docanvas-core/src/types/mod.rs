//! Type system utilities and aliases.
//!
//! - [`aliases`]: Type aliases for `Arc<Mutex<T>>`, `Arc<RwLock<T>>` and friends.

pub mod aliases;

pub use aliases::*;
