//! # ivbench Writer
//!
//! The publishing peer. Brings the region to the ready state, then per
//! iteration: prepares a fresh high-entropy payload outside the region,
//! publishes it with a timed host-copy, hands off to the reader, collects
//! the reader's durations and emits a per-iteration record.
//!
//! Timeouts are soft failures: the iteration is recorded as failed and
//! the writer resets its state word to READY so the suite continues.

pub mod error;
pub mod publisher;
pub mod suite;
pub mod summary;

pub use error::{WriterError, WriterResult};
pub use publisher::{IterationFailure, IterationOutcome, Publisher};
pub use summary::SuiteSummary;
