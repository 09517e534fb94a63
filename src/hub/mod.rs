//! Viewer fan-out
//!
//! One hub per process owns the set of connected viewer sessions. Roster
//! events are queued to every session independently; a slow or dead viewer
//! never stalls the rest.

pub mod sessions;

pub use sessions::{BroadcastHub, ViewerSession};
