//! The writer's per-iteration publish protocol.
//!
//! One iteration, both peers starting in READY:
//!
//! 1. prepare a source-of-truth payload outside the region (not timed)
//! 2. store sequence, data_size and digest into the header
//! 3. timed host-copy of the payload into the region, then a fence
//! 4. start the round-trip timer, publish SENDING
//! 5. bounded wait for the reader to reach PROCESSING, then ACKNOWLEDGED
//! 6. stop the round-trip timer, collect the reader's results
//! 7. return to READY and wait for the reader to follow
//!
//! A timeout at step 5 skips the iteration, resets the writer to READY
//! and reports the failure as data.

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::{info, warn};

use ivb::config::ProtocolConfig;
use ivb::consts::READY_MAGIC;
use ivb::digest::{PayloadDigest, Sha256Digest, DIGEST_BYTES};
use ivb::perf::{default_sampler, PerfSample, PerfSampler, PERF_SAMPLE_BYTES};
use ivb::record::{hex_encode, IterationRecord};
use ivb::timer::Stopwatch;
use ivbench_region::layout::FLAG_FLUSH_DEGRADED;
use ivbench_region::state::reader_state_label;
use ivbench_region::wait::wait_for;
use ivbench_region::{ReaderState, Region, RegionError, Timings, WriterState};

use crate::error::WriterResult;

/// Why an iteration was recorded as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationFailure {
    /// Reader never reached PROCESSING within the bound.
    ProcessingTimeout,
    /// Reader never reached ACKNOWLEDGED within the bound.
    AckTimeout,
    /// Reader reported a non-zero error code (digest mismatch or size
    /// rejection).
    Integrity(u32),
}

/// Everything the writer observed for one iteration.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    /// Sequence number this iteration was published under.
    pub sequence: u32,
    /// Advertised payload size in bytes.
    pub payload_size: u32,
    /// Payload memcpy into the region plus the fence [ns], writer clock.
    pub host_copy_ns: u64,
    /// Publishing SENDING to observing ACKNOWLEDGED [ns], writer clock.
    pub round_trip_ns: u64,
    /// Reader-reported durations (reader clock; data, not control).
    pub timings: Timings,
    /// Reader-reported error code.
    pub error_code: u32,
    /// Reader flags word.
    pub flags: u32,
    /// Reader-side perf sample block.
    pub guest_perf: [u8; PERF_SAMPLE_BYTES],
    /// Writer-side perf sample around the host-copy phase.
    pub host_perf: PerfSample,
    /// Failure classification, `None` on success.
    pub failure: Option<IterationFailure>,
}

impl IterationOutcome {
    fn failed(
        sequence: u32,
        payload_size: u32,
        host_copy_ns: u64,
        host_perf: PerfSample,
        failure: IterationFailure,
    ) -> Self {
        Self {
            sequence,
            payload_size,
            host_copy_ns,
            round_trip_ns: 0,
            timings: Timings::default(),
            error_code: match failure {
                IterationFailure::Integrity(code) => code,
                _ => 0,
            },
            flags: 0,
            guest_perf: [0u8; PERF_SAMPLE_BYTES],
            host_perf,
            failure: Some(failure),
        }
    }

    /// Whether the iteration completed with a matching digest.
    #[inline]
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Round-trip minus the reader's total processing, clamped at zero.
    /// A proxy for wake-up and polling cost; clocks are never compared.
    #[inline]
    pub fn notification_est_ns(&self) -> u64 {
        self.round_trip_ns.saturating_sub(self.timings.total_ns)
    }

    /// Convert into the emitted per-iteration record.
    pub fn to_record(&self, iteration: u32) -> IterationRecord {
        IterationRecord {
            iteration,
            payload_size: self.payload_size,
            host_copy_ns: self.host_copy_ns,
            round_trip_ns: self.round_trip_ns,
            notification_est_ns: self.notification_est_ns(),
            copy_ns: self.timings.copy_ns,
            hot_read_ns: self.timings.hot_read_ns,
            cold_read_ns: self.timings.cold_read_ns,
            read_write_ns: self.timings.read_write_ns,
            verify_ns: self.timings.verify_ns,
            cached_verify_ns: self.timings.cached_verify_ns,
            total_ns: self.timings.total_ns,
            success: self.success(),
            error_code: self.error_code,
            flush_degraded: self.flags & FLAG_FLUSH_DEGRADED != 0,
            host_perf: hex_encode(&self.host_perf.to_bytes()),
            guest_perf: hex_encode(&self.guest_perf),
        }
    }
}

/// Writer peer over one mapped region.
pub struct Publisher {
    region: Region,
    protocol: ProtocolConfig,
    hasher: Sha256Digest,
    rng: SmallRng,
    scratch: Vec<u8>,
    sampler: Box<dyn PerfSampler + Send>,
    sequence: u32,
}

impl Publisher {
    /// Create a publisher with the best available perf sampler.
    pub fn new(region: Region, protocol: ProtocolConfig) -> Self {
        Self::with_sampler(region, protocol, default_sampler())
    }

    /// Create a publisher with an explicit perf sampler.
    pub fn with_sampler(
        region: Region,
        protocol: ProtocolConfig,
        sampler: Box<dyn PerfSampler + Send>,
    ) -> Self {
        Self {
            region,
            protocol,
            hasher: Sha256Digest::new(),
            rng: SmallRng::from_entropy(),
            scratch: Vec::new(),
            sampler,
            sequence: 0,
        }
    }

    /// Next sequence number to be published.
    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Payload capacity of the mapped region.
    #[inline]
    pub fn payload_capacity(&self) -> usize {
        self.region.payload_capacity()
    }

    /// Bring the region to `magic = ready`, `writer_state = READY`,
    /// tolerating a stale region and a reader that started first.
    ///
    /// Waits for the reader to reach READY afterwards; a reader that is
    /// not up yet is a warning, not an error, since it re-synchronises
    /// through the magic gate whenever it arrives.
    pub fn initialise(&mut self) {
        info!(
            "initialising region ({} bytes payload capacity)",
            self.payload_capacity()
        );
        self.region.initialise(READY_MAGIC);

        let region = &self.region;
        let wait = wait_for(
            "reader READY after handshake",
            self.protocol.ack_timeout(),
            self.protocol.poll_interval(),
            || region.reader_state() == Some(ReaderState::Ready),
        );
        match wait {
            Ok(()) => info!("reader ready, synchronisation complete"),
            Err(e) => warn!(
                "{e}; proceeding anyway (reader state {})",
                reader_state_label(self.region.reader_state_raw())
            ),
        }
    }

    /// Publish one iteration with a fresh high-entropy payload of `len`
    /// bytes.
    pub fn send_random(&mut self, len: usize, bandwidth: bool) -> WriterResult<IterationOutcome> {
        // Source-of-truth preparation happens outside the region and
        // outside any timed phase.
        self.scratch.resize(len, 0);
        self.rng.fill_bytes(&mut self.scratch[..len]);
        self.hasher.update(&self.scratch[..len]);
        let digest = self.hasher.finalize();

        let scratch = std::mem::take(&mut self.scratch);
        let result = self.publish(&scratch[..len], &digest, bandwidth);
        self.scratch = scratch;
        result
    }

    /// Publish one iteration of `payload` advertised with `digest`.
    ///
    /// The digest is trusted as given; callers that corrupt the payload
    /// after digesting exercise the reader's integrity path.
    pub fn publish(
        &mut self,
        payload: &[u8],
        digest: &[u8; DIGEST_BYTES],
        bandwidth: bool,
    ) -> WriterResult<IterationOutcome> {
        let len = payload.len();
        let sequence = self.sequence;

        // B1: reject before touching any header field.
        self.region.payload(len).map(|_| ())?;

        self.region.set_sequence(sequence);
        self.region.set_data_size(len as u32);
        self.region.set_digest(digest);

        // Timed host-copy phase: memcpy into the region plus the fence.
        self.sampler.start();
        let copy_sw = Stopwatch::start()?;
        let dst = self.region.payload_mut(len)?;
        dst.copy_from_slice(payload);
        self.region.fence();
        let host_copy_ns = copy_sw.elapsed_ns()?;
        let host_perf = self.sampler.stop(len);

        // Round-trip: publish SENDING and chase the reader.
        let rt_sw = Stopwatch::start()?;
        self.region.set_writer_state(WriterState::Sending);

        // A fast reader may already be past PROCESSING when we look, so
        // ACKNOWLEDGED also satisfies the first wait.
        let region = &self.region;
        let processing = wait_for(
            "reader PROCESSING",
            self.protocol.processing_timeout(bandwidth),
            self.protocol.poll_interval(),
            || {
                matches!(
                    region.reader_state(),
                    Some(ReaderState::Processing) | Some(ReaderState::Acknowledged)
                )
            },
        );
        match processing {
            Ok(()) => {}
            Err(e @ RegionError::WaitTimeout { .. }) => {
                return Ok(self.abandon(sequence, len, host_copy_ns, host_perf, e, IterationFailure::ProcessingTimeout));
            }
            Err(e) => return Err(e.into()),
        }

        let region = &self.region;
        let acknowledged = wait_for(
            "reader ACKNOWLEDGED",
            self.protocol.ack_timeout(),
            self.protocol.poll_interval(),
            || region.reader_state() == Some(ReaderState::Acknowledged),
        );
        match acknowledged {
            Ok(()) => {}
            Err(e @ RegionError::WaitTimeout { .. }) => {
                return Ok(self.abandon(sequence, len, host_copy_ns, host_perf, e, IterationFailure::AckTimeout));
            }
            Err(e) => return Err(e.into()),
        }
        let round_trip_ns = rt_sw.elapsed_ns()?;

        // The reader's results are valid while it holds ACKNOWLEDGED;
        // collect them before releasing it.
        self.region.fence();
        let timings = self.region.timings();
        let error_code = self.region.error_code();
        let flags = self.region.flags();
        let guest_perf = self.region.perf_sample();

        self.region.set_writer_state(WriterState::Ready);
        self.wait_reader_rearmed();
        self.sequence += 1;

        let failure = if error_code != 0 {
            warn!("iteration {sequence} failed integrity check (error code {error_code})");
            Some(IterationFailure::Integrity(error_code))
        } else {
            None
        };

        Ok(IterationOutcome {
            sequence,
            payload_size: len as u32,
            host_copy_ns,
            round_trip_ns,
            timings,
            error_code,
            flags,
            guest_perf,
            host_perf,
            failure,
        })
    }

    /// Shutdown: no further messages. Also releases a reader parked in
    /// its idle wait.
    pub fn shutdown(&mut self) {
        info!("shutting down after {} iterations", self.sequence);
        self.region.set_writer_state(WriterState::Completed);
        self.region.set_test_complete(true);
        self.region.fence();
    }

    fn abandon(
        &mut self,
        sequence: u32,
        len: usize,
        host_copy_ns: u64,
        host_perf: PerfSample,
        timeout: RegionError,
        failure: IterationFailure,
    ) -> IterationOutcome {
        warn!(
            "iteration {sequence}: {timeout} (reader state {}), resetting",
            reader_state_label(self.region.reader_state_raw())
        );
        self.region.set_writer_state(WriterState::Ready);
        self.wait_reader_rearmed();
        self.sequence += 1;
        IterationOutcome::failed(sequence, len as u32, host_copy_ns, host_perf, failure)
    }

    /// Wait for the reader to return to READY before the next iteration;
    /// a laggard is logged, not failed.
    fn wait_reader_rearmed(&self) {
        let region = &self.region;
        let wait = wait_for(
            "reader READY for next iteration",
            self.protocol.ready_timeout(),
            self.protocol.poll_interval(),
            || {
                matches!(
                    region.reader_state(),
                    Some(ReaderState::Ready) | Some(ReaderState::Uninitialised)
                )
            },
        );
        if let Err(e) = wait {
            warn!("{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivb::digest::digest_of;
    use ivbench_region::layout::HEADER_BYTES;
    use ivbench_region::{RegionError, RegionMap};

    fn region_on_disk(size: usize) -> Region {
        let dir = tempfile::tempdir().unwrap();
        let map = RegionMap::create(&dir.path().join("region"), size).unwrap();
        Region::over(map).unwrap()
    }

    fn fast_protocol() -> ProtocolConfig {
        ProtocolConfig {
            handshake_timeout_s: 1,
            processing_timeout_ms: 50,
            bandwidth_processing_timeout_ms: 50,
            ack_timeout_ms: 100,
            ready_timeout_ms: 50,
            ..ProtocolConfig::default()
        }
    }

    #[test]
    fn oversized_payload_is_rejected_before_publishing() {
        let region = region_on_disk(HEADER_BYTES + 1024);
        let mut publisher = Publisher::new(region, fast_protocol());
        publisher.initialise();

        let payload = vec![0u8; 2048];
        let digest = digest_of(&payload);
        let result = publisher.publish(&payload, &digest, false);

        assert!(matches!(
            result,
            Err(crate::WriterError::Region(RegionError::PayloadTooLarge {
                requested: 2048,
                capacity: 1024,
            }))
        ));
        // Sequence is not consumed by a rejected publish.
        assert_eq!(publisher.sequence(), 0);
    }

    #[test]
    fn absent_reader_times_out_and_recovers() {
        let region = region_on_disk(HEADER_BYTES + 4096);
        let mut publisher = Publisher::new(region, fast_protocol());
        publisher.initialise();

        let payload = vec![7u8; 64];
        let outcome = publisher
            .publish(&payload, &digest_of(&payload), false)
            .unwrap();

        assert!(!outcome.success());
        assert_eq!(outcome.failure, Some(IterationFailure::ProcessingTimeout));
        assert_eq!(outcome.sequence, 0);
        // The writer is back in READY and the sequence advanced.
        assert_eq!(publisher.sequence(), 1);
    }

    #[test]
    fn failed_outcome_record_shape() {
        let outcome = IterationOutcome::failed(
            3,
            4096,
            555,
            PerfSample::default(),
            IterationFailure::AckTimeout,
        );
        let record = outcome.to_record(3);
        assert!(!record.success);
        assert_eq!(record.iteration, 3);
        assert_eq!(record.payload_size, 4096);
        assert_eq!(record.host_copy_ns, 555);
        assert_eq!(record.round_trip_ns, 0);
        assert_eq!(record.copy_ns, record.read_write_ns);
    }

    #[test]
    fn notification_estimate_clamps_at_zero() {
        let mut outcome = IterationOutcome::failed(
            0,
            0,
            0,
            PerfSample::default(),
            IterationFailure::AckTimeout,
        );
        outcome.round_trip_ns = 100;
        outcome.timings.total_ns = 250;
        assert_eq!(outcome.notification_est_ns(), 0);
        outcome.timings.total_ns = 40;
        assert_eq!(outcome.notification_est_ns(), 60);
    }
}
