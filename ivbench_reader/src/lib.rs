//! # ivbench Reader
//!
//! The consuming peer. Waits for the writer's ready token, then serves
//! messages: for each published payload it runs the four cache-state
//! measurement phases plus verification, ships its durations back through
//! the region, and acknowledges.
//!
//! All durations are measured on this peer's monotonic clock and are
//! never compared against writer-side timestamps.

pub mod error;
pub mod phases;
pub mod serve;

pub use error::{ReaderError, ReaderResult};
pub use phases::{run_phases, PhaseOutcome};
pub use serve::Server;
