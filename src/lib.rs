//! Capture engine for remote debugging protocol traffic.
//!
//! Send/receive events from a debugging client are appended to a bounded
//! buffer, the inspector's own registration traffic is filtered out, and
//! the visible list is pushed to a presenter with debounced refreshes.
//! Sessions can be saved to and restored from a versioned dump file.

pub mod api;
pub mod capture;
pub mod models;
pub mod utils;
