//! Frame slot binary layout.
//!
//! Offsets are fixed by hand rather than inferred from a `repr(C)` struct
//! so both peers (and any non-Rust tooling inspecting the region) agree
//! on them without trusting compiler padding. Little-endian throughout.
//!
//! Frame slot layout (payload at 6 cache lines):
//!   [0..4]     magic:          u32   (0 = uninitialised, READY_MAGIC = ready)
//!   [4..8]     test_complete:  u32
//!   [8..12]    writer_state:   u32   (writer-owned)
//!   [12..16]   reader_state:   u32   (reader-owned)
//!   [16..20]   sequence:       u32
//!   [20..24]   data_size:      u32
//!   [24..56]   digest:         [u8; 32]
//!   [56..60]   error_code:     u32   (reader-owned)
//!   [60..64]   flags:          u32   (reader-owned)
//!   [64..72]   copy_ns:        u64   (legacy alias of read_write_ns)
//!   [72..80]   verify_ns:      u64
//!   [80..88]   total_ns:       u64
//!   [88..96]   hot_read_ns:    u64
//!   [96..104]  cold_read_ns:   u64
//!   [104..112] read_write_ns:  u64
//!   [112..120] cached_verify_ns: u64
//!   [120..128] reserved:       u64
//!   [128..256] perf_sample:    [u8; 128]
//!   [256..384] reserved padding
//!   [384..]    payload

use static_assertions::const_assert_eq;

use ivb::consts::CACHE_LINE_SIZE;
use ivb::digest::DIGEST_BYTES;
use ivb::perf::PERF_SAMPLE_BYTES;

/// Offset of `magic`.
pub const MAGIC_OFFSET: usize = 0;
/// Offset of `test_complete`.
pub const TEST_COMPLETE_OFFSET: usize = 4;
/// Offset of the writer-owned state word.
pub const WRITER_STATE_OFFSET: usize = 8;
/// Offset of the reader-owned state word.
pub const READER_STATE_OFFSET: usize = 12;
/// Offset of `sequence`.
pub const SEQUENCE_OFFSET: usize = 16;
/// Offset of `data_size`.
pub const DATA_SIZE_OFFSET: usize = 20;
/// Offset of the 32-byte payload digest.
pub const DIGEST_OFFSET: usize = 24;
/// Offset of `error_code`.
pub const ERROR_CODE_OFFSET: usize = 56;
/// Offset of the reader flags word.
pub const FLAGS_OFFSET: usize = 60;

/// Offset of the timing block (eight consecutive u64 words).
pub const TIMINGS_OFFSET: usize = 64;
/// Offset of the legacy aggregate copy duration.
pub const COPY_NS_OFFSET: usize = 64;
/// Offset of the verify duration.
pub const VERIFY_NS_OFFSET: usize = 72;
/// Offset of the total processing duration.
pub const TOTAL_NS_OFFSET: usize = 80;
/// Offset of the hot-read duration.
pub const HOT_READ_NS_OFFSET: usize = 88;
/// Offset of the cold-read duration.
pub const COLD_READ_NS_OFFSET: usize = 96;
/// Offset of the read+write copy duration.
pub const READ_WRITE_NS_OFFSET: usize = 104;
/// Offset of the cached-verify duration.
pub const CACHED_VERIFY_NS_OFFSET: usize = 112;

/// Offset of the opaque perf sample block.
pub const PERF_SAMPLE_OFFSET: usize = 128;

/// Offset of the payload buffer. Six cache lines, so any page-aligned
/// mapping places the payload on a 64-byte boundary.
pub const PAYLOAD_OFFSET: usize = 384;

/// Total header size in bytes.
pub const HEADER_BYTES: usize = PAYLOAD_OFFSET;

/// Flag bit: cache eviction degraded to a fence-only barrier.
pub const FLAG_FLUSH_DEGRADED: u32 = 1 << 0;

// Layout sanity: digest and perf block fit where the table says, every
// word is naturally aligned, and the payload lands on a cache line.
const_assert_eq!(DIGEST_OFFSET + DIGEST_BYTES, ERROR_CODE_OFFSET);
const_assert_eq!(PERF_SAMPLE_OFFSET + PERF_SAMPLE_BYTES, 256);
const_assert_eq!(PAYLOAD_OFFSET % CACHE_LINE_SIZE, 0);
const_assert_eq!(TIMINGS_OFFSET % 8, 0);
const_assert_eq!(CACHED_VERIFY_NS_OFFSET + 8 + 8, PERF_SAMPLE_OFFSET);

/// Payload capacity of a region of `region_size` total bytes.
#[inline]
pub const fn payload_capacity(region_size: usize) -> usize {
    region_size.saturating_sub(HEADER_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_pinned() {
        // The full table, byte for byte. Changing any of these breaks the
        // wire protocol with already-deployed peers.
        assert_eq!(MAGIC_OFFSET, 0);
        assert_eq!(TEST_COMPLETE_OFFSET, 4);
        assert_eq!(WRITER_STATE_OFFSET, 8);
        assert_eq!(READER_STATE_OFFSET, 12);
        assert_eq!(SEQUENCE_OFFSET, 16);
        assert_eq!(DATA_SIZE_OFFSET, 20);
        assert_eq!(DIGEST_OFFSET, 24);
        assert_eq!(ERROR_CODE_OFFSET, 56);
        assert_eq!(FLAGS_OFFSET, 60);
        assert_eq!(COPY_NS_OFFSET, 64);
        assert_eq!(VERIFY_NS_OFFSET, 72);
        assert_eq!(TOTAL_NS_OFFSET, 80);
        assert_eq!(HOT_READ_NS_OFFSET, 88);
        assert_eq!(COLD_READ_NS_OFFSET, 96);
        assert_eq!(READ_WRITE_NS_OFFSET, 104);
        assert_eq!(CACHED_VERIFY_NS_OFFSET, 112);
        assert_eq!(PERF_SAMPLE_OFFSET, 128);
        assert_eq!(PAYLOAD_OFFSET, 384);
    }

    #[test]
    fn state_words_are_naturally_aligned() {
        assert_eq!(WRITER_STATE_OFFSET % 4, 0);
        assert_eq!(READER_STATE_OFFSET % 4, 0);
        assert_eq!(MAGIC_OFFSET % 4, 0);
        assert_eq!(TEST_COMPLETE_OFFSET % 4, 0);
    }

    #[test]
    fn payload_alignment() {
        assert_eq!(PAYLOAD_OFFSET % 64, 0);
        assert_eq!(HEADER_BYTES, 384);
    }

    #[test]
    fn capacity_accounts_for_header() {
        assert_eq!(payload_capacity(HEADER_BYTES), 0);
        assert_eq!(payload_capacity(HEADER_BYTES + 4096), 4096);
        assert_eq!(payload_capacity(0), 0);
        let region = 64 * 1024 * 1024;
        assert_eq!(payload_capacity(region), region - 384);
    }
}
