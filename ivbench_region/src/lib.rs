//! # ivbench Shared Region
//!
//! The agreed binary layout, visibility rules and dual state machine that
//! let two unsynchronised peers (one mapping a host-backed file, one
//! mapping a PCI BAR of the same backing memory) agree on message
//! boundaries without losing writes.
//!
//! No language-level synchronisation primitive crosses the host/guest
//! boundary here. The protocol relies only on:
//!
//! - store/load atomicity of naturally-aligned 32-bit words, accessed
//!   through volatile single-word operations;
//! - a full memory fence after every store that precedes, and before
//!   every load that follows, a state transition;
//! - each peer's exclusive ownership of a disjoint set of header fields.
//!
//! ## Publication contract
//!
//! A publishing peer stores all payload/header fields, fences, stores the
//! single state word that advertises readiness, and fences again. An
//! observing peer polls the state word, fences on match, and only then
//! loads the fields the state advertises. [`Region`] encodes both halves.
//!
//! ## Crate layout
//!
//! - [`layout`] - explicit field offsets (identical in both peers)
//! - [`state`] - writer/reader state enums with fixed wire values
//! - [`map`] - the backing object: shared file or PCI resource node
//! - [`region`] - volatile per-field accessors over the mapping
//! - [`wait`] - bounded polling waits
//! - [`error`] - error types

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod layout;
pub mod map;
pub mod region;
pub mod state;
pub mod wait;

pub use error::{RegionError, RegionResult};
pub use map::{Backing, RegionMap};
pub use region::{Region, Timings};
pub use state::{ReaderState, WriterState};
