//! Error types for region operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening, mapping or synchronising over the
/// shared region.
#[derive(Debug, Error)]
pub enum RegionError {
    /// No usable backing object was found.
    #[error("backing object not found: {path}")]
    BackingNotFound {
        /// Path that was probed.
        path: PathBuf,
    },

    /// Backing object exists but is smaller than the configured region.
    #[error("backing object {path} is {actual} bytes, need at least {expected}")]
    SizeMismatch {
        /// Backing object path.
        path: PathBuf,
        /// Size found on disk.
        actual: u64,
        /// Minimum size required.
        expected: u64,
    },

    /// Region too small to hold the header plus any payload.
    #[error("region size {size} cannot hold the {header} byte header")]
    RegionTooSmall {
        /// Configured region size.
        size: usize,
        /// Header size in bytes.
        header: usize,
    },

    /// Requested payload exceeds the region's payload capacity.
    #[error("payload of {requested} bytes exceeds capacity {capacity}")]
    PayloadTooLarge {
        /// Requested payload size.
        requested: usize,
        /// Payload capacity of the mapped region.
        capacity: usize,
    },

    /// A bounded per-iteration wait expired.
    #[error("timeout waiting for {awaited} after {waited_ms} ms")]
    WaitTimeout {
        /// Description of the awaited condition.
        awaited: &'static str,
        /// How long the peer waited.
        waited_ms: u64,
    },

    /// IO error from open/map/stat.
    #[error("region I/O error: {source}")]
    Io {
        /// Source IO error.
        #[from]
        source: std::io::Error,
    },

    /// System call error.
    #[error("system call error: {source}")]
    Nix {
        /// Source nix error.
        #[from]
        source: nix::Error,
    },
}

/// Result type for region operations.
pub type RegionResult<T> = Result<T, RegionError>;
