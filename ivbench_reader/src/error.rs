//! Reader-side error types.

use thiserror::Error;

use ivbench_region::RegionError;

/// Errors that abort the reader (setup and handshake failures).
///
/// Per-message problems are reported as data through the region's
/// `error_code` field, never through this type.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Region open/map/size failure.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// The writer never produced the ready token within the bound.
    #[error("writer not ready after {waited_ms} ms (magic=0x{magic:08X}, writer_state={writer_state})")]
    HandshakeTimeout {
        /// How long the reader waited.
        waited_ms: u64,
        /// Last observed magic value.
        magic: u32,
        /// Last observed writer state label.
        writer_state: String,
    },

    /// Monotonic clock failure while timing a phase.
    #[error("clock error: {source}")]
    Clock {
        /// Source nix error.
        #[from]
        source: nix::Error,
    },
}

/// Result type for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;
