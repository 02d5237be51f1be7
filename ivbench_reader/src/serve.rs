//! The reader's serve loop.
//!
//! WAITING_FOR_WRITER until the ready token shows up, then READY /
//! PROCESSING / ACKNOWLEDGED per message, exiting on the completion flag
//! or after the message budget.

use tracing::{debug, info, warn};

use ivb::config::ProtocolConfig;
use ivb::consts::{ERROR_DIGEST_MISMATCH, ERROR_SIZE_OVERFLOW, READY_MAGIC};
use ivb::digest::Sha256Digest;
use ivb::perf::{default_sampler, PerfSampler};
use ivb::record::hex_encode;
use ivb::timer::Stopwatch;
use ivbench_region::layout::FLAG_FLUSH_DEGRADED;
use ivbench_region::state::{reader_state_label, writer_state_label};
use ivbench_region::wait::{wait_for, wait_for_or};
use ivbench_region::{ReaderState, Region, Timings, WriterState};

use crate::error::{ReaderError, ReaderResult};
use crate::phases::run_phases;

/// Reader peer over one mapped region.
pub struct Server {
    region: Region,
    protocol: ProtocolConfig,
    hasher: Sha256Digest,
    sampler: Box<dyn PerfSampler + Send>,
    local: Vec<u8>,
}

impl Server {
    /// Create a server with the best available perf sampler.
    pub fn new(region: Region, protocol: ProtocolConfig) -> Self {
        Self::with_sampler(region, protocol, default_sampler())
    }

    /// Create a server with an explicit perf sampler.
    pub fn with_sampler(
        region: Region,
        protocol: ProtocolConfig,
        sampler: Box<dyn PerfSampler + Send>,
    ) -> Self {
        Self {
            region,
            protocol,
            hasher: Sha256Digest::new(),
            sampler,
            local: Vec::new(),
        }
    }

    /// Wait for the writer's ready token, then enter READY.
    ///
    /// A region mapped before the writer initialised it reads as zeros
    /// (or garbage from a prior run); neither passes the two-level gate
    /// of `magic == READY_MAGIC` and `writer_state == READY`.
    pub fn handshake(&mut self) -> ReaderResult<()> {
        self.log_initial_state();
        self.region.set_reader_state(ReaderState::WaitingForWriter);

        if let Some(state) = self.region.writer_state() {
            if state != WriterState::Uninitialised && state != WriterState::Ready {
                info!("writer currently in {state}, waiting for handshake");
            }
        }

        let region = &self.region;
        let result = wait_for(
            "writer ready token",
            self.protocol.handshake_timeout(),
            std::time::Duration::from_millis(ivb::consts::HANDSHAKE_POLL_INTERVAL_MS),
            || region.magic() == READY_MAGIC && region.writer_state() == Some(WriterState::Ready),
        );
        if result.is_err() {
            return Err(ReaderError::HandshakeTimeout {
                waited_ms: self.protocol.handshake_timeout().as_millis() as u64,
                magic: self.region.magic(),
                writer_state: writer_state_label(self.region.writer_state_raw()),
            });
        }

        self.region.fence();
        info!("writer initialisation complete, ready for messages");
        self.region.set_reader_state(ReaderState::Ready);
        Ok(())
    }

    /// Serve up to `budget` messages.
    ///
    /// Returns the number of messages actually processed; fewer than the
    /// budget means the completion flag was observed.
    pub fn serve(&mut self, budget: u32) -> ReaderResult<u32> {
        let mut served = 0;

        while served < budget {
            if self.region.test_complete() {
                info!("completion signal received, exiting after {served} messages");
                break;
            }

            // Idle wait for the next message. Bounded only by the
            // completion flag; this is the reader's parked state.
            while self.region.writer_state() != Some(WriterState::Sending) {
                if self.region.test_complete() {
                    info!("completion signal received while idle, exiting");
                    return Ok(served);
                }
                std::thread::sleep(self.protocol.poll_interval());
            }

            self.handle_message()?;
            served += 1;

            // Release: wait for the writer to consume our timings, then
            // rearm for the next iteration.
            let released = wait_for_or(
                "writer READY after acknowledge",
                self.protocol.ready_timeout(),
                self.protocol.poll_interval(),
                || self.region.writer_state() == Some(WriterState::Ready),
                || self.region.test_complete(),
            );
            match released {
                Ok(true) => {}
                Ok(false) => {
                    self.region.set_reader_state(ReaderState::Ready);
                    info!("completion signal received during release, exiting");
                    return Ok(served);
                }
                Err(e) => warn!("{e}, rearming anyway"),
            }
            self.region.set_reader_state(ReaderState::Ready);
        }

        Ok(served)
    }

    /// Handshake then serve, the reader's whole invocation surface.
    pub fn run(&mut self, budget: u32) -> ReaderResult<u32> {
        self.handshake()?;
        self.serve(budget)
    }

    fn handle_message(&mut self) -> ReaderResult<()> {
        let total = Stopwatch::start()?;
        self.region.set_reader_state(ReaderState::Processing);

        // Acquire the header the SENDING store advertises.
        self.region.fence();
        let sequence = self.region.sequence();
        let data_size = self.region.data_size() as usize;
        let expected_digest = self.region.digest();

        debug!(
            "message received: sequence={sequence}, data_size={data_size} ({:.2} MiB)",
            data_size as f64 / (1024.0 * 1024.0)
        );

        let mut timings = Timings::default();
        let mut flags = 0u32;
        let error_code;

        self.sampler.start();
        match self.region.payload(data_size) {
            Ok(payload) => {
                let outcome = run_phases(
                    payload,
                    &expected_digest,
                    &mut self.local,
                    &mut self.hasher,
                )?;

                timings.hot_read_ns = outcome.hot_read_ns;
                timings.cold_read_ns = outcome.cold_read_ns;
                timings.read_write_ns = outcome.read_write_ns;
                timings.copy_ns = outcome.read_write_ns;
                timings.verify_ns = outcome.verify_ns;
                timings.cached_verify_ns = outcome.cached_verify_ns;
                if outcome.flush_degraded {
                    flags |= FLAG_FLUSH_DEGRADED;
                }

                if outcome.digest_ok {
                    error_code = 0;
                    debug!("integrity verified for sequence {sequence}");
                } else {
                    error_code = ERROR_DIGEST_MISMATCH;
                    warn!(
                        "integrity check failed for sequence {sequence}: expected {}, got {}",
                        hex_encode(&expected_digest),
                        hex_encode(&outcome.computed_digest)
                    );
                }
            }
            Err(e) => {
                warn!("rejecting message {sequence}: {e}");
                error_code = ERROR_SIZE_OVERFLOW;
            }
        }
        let sample = self.sampler.stop(data_size);

        timings.total_ns = total.elapsed_ns()?;

        // Publish results before the state flip: timings, flags, error
        // code, perf sample, fence, then ACKNOWLEDGED.
        self.region.set_timings(&timings);
        self.region.set_flags(flags);
        self.region.set_error_code(error_code);
        self.region.set_perf_sample(&sample.to_bytes());
        self.region.fence();
        self.region.set_reader_state(ReaderState::Acknowledged);
        Ok(())
    }

    fn log_initial_state(&self) {
        let region = &self.region;
        info!(
            "initial region state: magic=0x{:08X} sequence={} data_size={} error_code={} \
             test_complete={} writer_state={} reader_state={}",
            region.magic(),
            region.sequence(),
            region.data_size(),
            region.error_code(),
            region.test_complete(),
            writer_state_label(region.writer_state_raw()),
            reader_state_label(region.reader_state_raw()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivb::config::ProtocolConfig;
    use ivbench_region::RegionMap;

    fn region_on_disk(size: usize) -> Region {
        let dir = tempfile::tempdir().unwrap();
        let map = RegionMap::create(&dir.path().join("region"), size).unwrap();
        Region::over(map).unwrap()
    }

    fn fast_protocol() -> ProtocolConfig {
        ProtocolConfig {
            handshake_timeout_s: 1,
            processing_timeout_ms: 200,
            bandwidth_processing_timeout_ms: 200,
            ack_timeout_ms: 500,
            ready_timeout_ms: 200,
            ..ProtocolConfig::default()
        }
    }

    #[test]
    fn handshake_times_out_on_dead_region() {
        let region = region_on_disk(4096);
        let mut server = Server::new(region, fast_protocol());
        let result = server.handshake();
        assert!(matches!(result, Err(ReaderError::HandshakeTimeout { .. })));
    }

    #[test]
    fn serve_exits_on_completion_flag() {
        let mut region = region_on_disk(4096);
        region.initialise(READY_MAGIC);
        region.set_test_complete(true);
        region.fence();

        let mut server = Server::new(region, fast_protocol());
        // handshake() still succeeds: magic and READY are both published.
        server.handshake().unwrap();
        let served = server.serve(5).unwrap();
        assert_eq!(served, 0);
    }

    #[test]
    fn zero_budget_serves_nothing() {
        let mut region = region_on_disk(4096);
        region.initialise(READY_MAGIC);
        let mut server = Server::new(region, fast_protocol());
        server.handshake().unwrap();
        assert_eq!(server.serve(0).unwrap(), 0);
    }
}
