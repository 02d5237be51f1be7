//! System-wide constants for the ivbench workspace.
//!
//! Single source of truth for wire constants, size limits, polling
//! cadence and timeout bounds. Both peers compile against these values;
//! a mismatch between peers is a protocol error by definition.

/// Ready token stored in the region's `magic` word once the writer has
/// finished first-time setup. `0` means the region is not yet initialised.
pub const READY_MAGIC: u32 = 0x4956_5348;

/// CPU cache line size in bytes. The payload area is aligned to this.
pub const CACHE_LINE_SIZE: usize = 64;

/// Default total region size in bytes (64 MiB).
pub const DEFAULT_REGION_SIZE: usize = 64 * 1024 * 1024;

/// Minimum accepted region size in bytes (one page).
pub const REGION_MIN_SIZE: usize = 4096;

/// Maximum accepted region size in bytes (1 GiB).
pub const REGION_MAX_SIZE: usize = 1_073_741_824;

/// Polling yield between counterparty state reads [µs].
pub const POLL_INTERVAL_US: u64 = 10;

/// Polling yield while waiting for the initial handshake [ms].
///
/// The handshake is not latency-sensitive; a coarser poll keeps the
/// reader from spinning for up to 50 seconds.
pub const HANDSHAKE_POLL_INTERVAL_MS: u64 = 10;

/// Bound on the reader's wait for the ready token [s].
pub const HANDSHAKE_TIMEOUT_S: u64 = 50;

/// Bound on the writer's post-SENDING wait for PROCESSING [ms], latency suite.
pub const PROCESSING_TIMEOUT_MS: u64 = 1_000;

/// Bound on the writer's post-SENDING wait for PROCESSING [ms], bandwidth suite.
pub const BANDWIDTH_PROCESSING_TIMEOUT_MS: u64 = 2_000;

/// Bound on the writer's wait for ACKNOWLEDGED [ms].
pub const ACK_TIMEOUT_MS: u64 = 10_000;

/// Bound on the wait for the counterparty to return to READY [ms].
pub const READY_TIMEOUT_MS: u64 = 1_000;

/// Default latency suite iteration count.
pub const DEFAULT_LATENCY_ITERATIONS: u32 = 100;

/// Default bandwidth suite iterations per payload size.
pub const DEFAULT_BANDWIDTH_ITERATIONS: u32 = 10;

/// Default settle delay between bandwidth iterations [ms].
pub const DEFAULT_SETTLE_MS: u64 = 10;

/// 1920x1080 24bpp frame payload in bytes.
pub const FHD_FRAME_BYTES: usize = 1920 * 1080 * 3;

/// 2560x1440 24bpp frame payload in bytes.
pub const QHD_FRAME_BYTES: usize = 2560 * 1440 * 3;

/// 3840x2160 24bpp frame payload in bytes.
pub const UHD_FRAME_BYTES: usize = 3840 * 2160 * 3;

/// Reader error code: recomputed digest did not match the header digest.
pub const ERROR_DIGEST_MISMATCH: u32 = 1;

/// Reader error code: advertised `data_size` exceeds the mapped capacity.
pub const ERROR_SIZE_OVERFLOW: u32 = 2;

/// Default host-side backing file path.
pub const DEFAULT_REGION_PATH: &str = "/dev/shm/ivbench";

/// Default guest-side PCI BAR resource node.
pub const DEFAULT_PCI_RESOURCE_PATH: &str = "/sys/bus/pci/devices/0000:00:03.0/resource2";
