//! Per-iteration benchmark record.
//!
//! One record is emitted per protocol iteration regardless of success so
//! downstream aggregation can compute failure rates. Records are printed
//! as JSON lines on stdout; CSV conversion and statistics happen outside
//! the benchmark core.

use serde::{Deserialize, Serialize};

use crate::perf::{PerfSample, PERF_SAMPLE_BYTES};

/// Everything measured for one publish/consume/acknowledge cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Iteration index within the suite.
    pub iteration: u32,
    /// Advertised payload size in bytes.
    pub payload_size: u32,
    /// Writer clock: payload memcpy into the region plus the fence.
    pub host_copy_ns: u64,
    /// Writer clock: publishing SENDING to observing ACKNOWLEDGED.
    pub round_trip_ns: u64,
    /// `round_trip_ns - total_ns`, clamped at zero.
    pub notification_est_ns: u64,
    /// Legacy aggregate, equal to `read_write_ns`.
    pub copy_ns: u64,
    /// Reader clock: strided read with payload resident in cache.
    pub hot_read_ns: u64,
    /// Reader clock: strided read after line-by-line eviction.
    pub cold_read_ns: u64,
    /// Reader clock: bulk copy into a reader-local buffer after eviction.
    pub read_write_ns: u64,
    /// Reader clock: digest of the local copy.
    pub verify_ns: u64,
    /// Reader clock: same measurement as `verify_ns` (local buffer is in-cache).
    pub cached_verify_ns: u64,
    /// Reader clock: PROCESSING entry to just before ACKNOWLEDGED.
    pub total_ns: u64,
    /// Whether the iteration completed with a matching digest.
    pub success: bool,
    /// Non-zero reader-reported error code.
    pub error_code: u32,
    /// True when cache eviction degraded to a fence-only barrier.
    pub flush_degraded: bool,
    /// Writer-side perf counter block, hex-encoded.
    pub host_perf: String,
    /// Reader-side perf counter block, hex-encoded.
    pub guest_perf: String,
}

impl IterationRecord {
    /// Record for an iteration that timed out or otherwise never produced
    /// reader timings.
    pub fn failed(iteration: u32, payload_size: u32, error_code: u32) -> Self {
        Self {
            iteration,
            payload_size,
            success: false,
            error_code,
            ..Self::default()
        }
    }

    /// Decode the reader-side perf block, if present.
    pub fn guest_perf_sample(&self) -> Option<PerfSample> {
        decode_perf_hex(&self.guest_perf)
    }

    /// Decode the writer-side perf block, if present.
    pub fn host_perf_sample(&self) -> Option<PerfSample> {
        decode_perf_hex(&self.host_perf)
    }
}

fn decode_perf_hex(hex: &str) -> Option<PerfSample> {
    if hex.len() != PERF_SAMPLE_BYTES * 2 {
        return None;
    }
    let mut bytes = [0u8; PERF_SAMPLE_BYTES];
    for (i, out) in bytes.iter_mut().enumerate() {
        *out = u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok()?;
    }
    Some(PerfSample::from_bytes(&bytes))
}

/// Hex-encode an opaque byte block for record emission.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_has_zero_timings() {
        let rec = IterationRecord::failed(7, 4096, 0);
        assert_eq!(rec.iteration, 7);
        assert_eq!(rec.payload_size, 4096);
        assert!(!rec.success);
        assert_eq!(rec.round_trip_ns, 0);
        assert_eq!(rec.total_ns, 0);
    }

    #[test]
    fn json_roundtrip() {
        let mut rec = IterationRecord::failed(1, 64, 1);
        rec.host_copy_ns = 1234;
        let json = serde_json::to_string(&rec).unwrap();
        let back: IterationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.iteration, 1);
        assert_eq!(back.host_copy_ns, 1234);
        assert_eq!(back.error_code, 1);
    }

    #[test]
    fn perf_block_roundtrips_through_hex() {
        let sample = PerfSample {
            cpu_cycles: 99,
            instructions: 88,
            ..PerfSample::default()
        };
        let mut rec = IterationRecord::default();
        rec.guest_perf = hex_encode(&sample.to_bytes());
        assert_eq!(rec.guest_perf_sample(), Some(sample));
        assert_eq!(rec.host_perf_sample(), None);
    }

    #[test]
    fn hex_encoding_is_lowercase_pairs() {
        assert_eq!(hex_encode(&[0x00, 0xAB, 0x10]), "00ab10");
    }
}
