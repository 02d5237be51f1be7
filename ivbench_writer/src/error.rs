//! Writer-side error types.

use thiserror::Error;

use ivb::config::ConfigError;
use ivbench_region::RegionError;

/// Errors that abort the writer.
///
/// Per-iteration timeouts and integrity failures are *not* errors; they
/// surface as failed [`crate::IterationOutcome`]s so the suite continues.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Region open/map/size/bounds failure.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// Configuration loading or validation failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Monotonic clock failure while timing a phase.
    #[error("clock error: {source}")]
    Clock {
        /// Source nix error.
        #[from]
        source: nix::Error,
    },
}

/// Result type for writer operations.
pub type WriterResult<T> = Result<T, WriterError>;
