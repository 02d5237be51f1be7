//! The per-message measurement phases.
//!
//! Strict order, full fence between phases:
//!
//!   A. warm-up      - read every cache line once; page faults and TLB
//!                     fills happen here, outside the timed phases
//!   B. hot-read     - timed strided read, payload cache-resident
//!   C. cold-read    - evict the payload's lines, fence, timed strided read
//!   D. read+write   - evict again, fence, timed bulk copy into a
//!                     reader-local buffer
//!   E. verify       - timed digest of the local copy, compared against
//!                     the advertised digest
//!
//! Verification runs on the local copy so the integrity check never
//! touches the shared region's timing. During all phases the payload is
//! only read, never written.

use std::sync::atomic::{fence, Ordering};

use ivb::cache::flush_slice;
use ivb::consts::CACHE_LINE_SIZE;
use ivb::digest::{PayloadDigest, DIGEST_BYTES};
use ivb::timer::Stopwatch;

/// Durations and verdict of one measurement pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseOutcome {
    /// Phase B duration [ns].
    pub hot_read_ns: u64,
    /// Phase C duration [ns].
    pub cold_read_ns: u64,
    /// Phase D duration [ns].
    pub read_write_ns: u64,
    /// Phase E duration [ns].
    pub verify_ns: u64,
    /// Same measurement as `verify_ns`; the local copy is in-cache here.
    pub cached_verify_ns: u64,
    /// Whether the recomputed digest matched the advertised one.
    pub digest_ok: bool,
    /// Digest the reader computed over the local copy.
    pub computed_digest: [u8; DIGEST_BYTES],
    /// True when cache eviction degraded to a fence-only barrier.
    pub flush_degraded: bool,
}

/// Read one byte per cache line, XOR-accumulated so the loads cannot be
/// elided.
fn strided_read(buf: &[u8]) -> u8 {
    let mut acc = 0u8;
    let mut offset = 0;
    while offset < buf.len() {
        acc ^= unsafe { std::ptr::read_volatile(buf.as_ptr().add(offset)) };
        offset += CACHE_LINE_SIZE;
    }
    acc
}

/// Run phases A-E over `payload`.
///
/// `local` is the reader-owned destination buffer; it is resized (and
/// thereby page-touched) during warm-up, outside any timed phase.
pub fn run_phases(
    payload: &[u8],
    expected_digest: &[u8; DIGEST_BYTES],
    local: &mut Vec<u8>,
    hasher: &mut dyn PayloadDigest,
) -> Result<PhaseOutcome, nix::Error> {
    let mut outcome = PhaseOutcome::default();

    // Phase A: warm-up. Faults the payload pages and the local buffer.
    std::hint::black_box(strided_read(payload));
    local.clear();
    local.resize(payload.len(), 0);
    fence(Ordering::SeqCst);

    // Phase B: hot read.
    let sw = Stopwatch::start()?;
    std::hint::black_box(strided_read(payload));
    outcome.hot_read_ns = sw.elapsed_ns()?;
    fence(Ordering::SeqCst);

    // Phase C: cold read after line eviction.
    let flush = flush_slice(payload);
    outcome.flush_degraded = flush.is_degraded();
    let sw = Stopwatch::start()?;
    std::hint::black_box(strided_read(payload));
    outcome.cold_read_ns = sw.elapsed_ns()?;
    fence(Ordering::SeqCst);

    // Phase D: bulk copy after re-eviction.
    let flush = flush_slice(payload);
    outcome.flush_degraded |= flush.is_degraded();
    let sw = Stopwatch::start()?;
    if !payload.is_empty() {
        unsafe {
            std::ptr::copy_nonoverlapping(payload.as_ptr(), local.as_mut_ptr(), payload.len());
        }
    }
    fence(Ordering::SeqCst);
    outcome.read_write_ns = sw.elapsed_ns()?;

    // Phase E: verify the local copy.
    let sw = Stopwatch::start()?;
    hasher.update(local);
    outcome.computed_digest = hasher.finalize();
    outcome.verify_ns = sw.elapsed_ns()?;
    outcome.cached_verify_ns = outcome.verify_ns;
    outcome.digest_ok = &outcome.computed_digest == expected_digest;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivb::digest::{digest_of, Sha256Digest};

    #[test]
    fn clean_payload_verifies() {
        let payload = vec![0x3Cu8; 256 * 1024];
        let expected = digest_of(&payload);
        let mut local = Vec::new();
        let mut hasher = Sha256Digest::new();

        let outcome = run_phases(&payload, &expected, &mut local, &mut hasher).unwrap();

        assert!(outcome.digest_ok);
        assert_eq!(local, payload);
        assert!(outcome.hot_read_ns > 0);
        assert!(outcome.cold_read_ns > 0);
        assert!(outcome.read_write_ns > 0);
        assert!(outcome.verify_ns > 0);
        assert_eq!(outcome.cached_verify_ns, outcome.verify_ns);
    }

    #[test]
    fn corrupted_payload_is_detected() {
        let mut payload = vec![0u8; 64 * 1024];
        payload[12345] = 0xAB;
        let expected = digest_of(&payload);
        payload[54321] ^= 0x01; // flip after digest

        let mut local = Vec::new();
        let mut hasher = Sha256Digest::new();
        let outcome = run_phases(&payload, &expected, &mut local, &mut hasher).unwrap();

        assert!(!outcome.digest_ok);
        assert_eq!(outcome.computed_digest, digest_of(&payload));
        assert_ne!(outcome.computed_digest, expected);
    }

    #[test]
    fn zero_size_payload_is_a_noop_that_verifies() {
        let expected = digest_of(&[]);
        let mut local = vec![0xFFu8; 16];
        let mut hasher = Sha256Digest::new();

        let outcome = run_phases(&[], &expected, &mut local, &mut hasher).unwrap();

        assert!(outcome.digest_ok);
        assert!(local.is_empty());
        // Zero-duration phases are allowed for an empty payload.
    }

    #[test]
    fn local_buffer_is_reused_across_sizes() {
        let mut local = Vec::new();
        let mut hasher = Sha256Digest::new();

        let big = vec![1u8; 8192];
        run_phases(&big, &digest_of(&big), &mut local, &mut hasher).unwrap();
        assert_eq!(local.len(), 8192);

        let small = vec![2u8; 64];
        let outcome = run_phases(&small, &digest_of(&small), &mut local, &mut hasher).unwrap();
        assert_eq!(local.len(), 64);
        assert!(outcome.digest_ok);
    }

    #[test]
    fn strided_read_covers_partial_tail_line() {
        // A payload not a multiple of the line size still terminates and
        // reads the final partial line's first byte.
        let buf = vec![0xA5u8; CACHE_LINE_SIZE * 2 + 7];
        let acc = strided_read(&buf);
        // Three strided loads of 0xA5.
        assert_eq!(acc, 0xA5 ^ 0xA5 ^ 0xA5);
    }
}
