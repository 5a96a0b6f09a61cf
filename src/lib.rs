//! Dungeon host - Lifecycle controller for a single embedded dungeon session
//!
//! Creates, focuses and tears down the linked tab, window, session and
//! content view of one running instance as a single unit.

pub mod core;
pub mod host;

/// Application name constant
pub const APP_NAME: &str = "Shifty Dungeon";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
