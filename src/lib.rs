//! Pending deposits processor library surface.
//!
//! `main.rs` wires these modules into the running daemon; integration
//! tests under `tests/` exercise them directly.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod locks;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod repository;
pub mod shutdown;
pub mod state_machine;
pub mod stellar;
pub mod workers;
