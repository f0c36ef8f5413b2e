//! High-level server API
//!
//! Wraps the reactor with a builder and process signal handling.

mod builder;

pub use builder::{Server, ServerBuilder, shutdown_signal};
