//! ivbench Common Library
//!
//! Shared constants, configuration loading, per-iteration records and the
//! orthogonal measurement helpers (monotonic timer, cache-line flush,
//! payload digest, hardware perf sampler) used by every ivbench crate.
//!
//! # Module Structure
//!
//! - [`consts`] - Numeric limits, wire constants and default paths
//! - [`config`] - TOML configuration loading and validation
//! - [`record`] - Per-iteration benchmark record (JSON-line emission)
//! - [`timer`] - Monotonic nanosecond clock
//! - [`cache`] - Cache-line eviction primitive with fence-only fallback
//! - [`digest`] - Payload digest interface and SHA-256 implementation
//! - [`perf`] - Optional hardware performance counter sampler
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! ivb = { package = "ivbench_common", path = "../ivbench_common" }
//! ```

pub mod cache;
pub mod config;
pub mod consts;
pub mod digest;
pub mod perf;
pub mod record;
pub mod timer;

/// Initialize tracing for benchmark-run logging.
///
/// Both peer binaries call this once at startup. Honors `RUST_LOG`. Logs
/// go to stderr; stdout is reserved for the per-iteration records.
pub fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
