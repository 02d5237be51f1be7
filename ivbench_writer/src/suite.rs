//! Benchmark suites.
//!
//! Both suites run the same protocol; they differ only in payload
//! schedule, settle delay and the PROCESSING wait bound. Records are
//! streamed to the caller's sink as they are produced so a crash still
//! leaves the completed iterations on disk.

use std::time::Duration;

use tracing::{debug, info, warn};

use ivb::config::{BandwidthSuiteConfig, LatencySuiteConfig};
use ivb::record::IterationRecord;

use crate::error::WriterResult;
use crate::publisher::Publisher;
use crate::summary::SuiteSummary;

/// Run the latency suite: N iterations of one fixed large payload.
///
/// A payload preset larger than the mapped capacity is capped to it.
pub fn run_latency(
    publisher: &mut Publisher,
    config: &LatencySuiteConfig,
    emit: &mut dyn FnMut(&IterationRecord),
) -> WriterResult<SuiteSummary> {
    let capacity = publisher.payload_capacity();
    let mut len = config.frame.bytes();
    if len > capacity {
        warn!(
            "latency payload {} ({} bytes) exceeds capacity {}, capping",
            config.frame.label(),
            len,
            capacity
        );
        len = capacity;
    }

    info!(
        "latency suite: {} iterations of {} ({:.2} MiB)",
        config.iterations,
        config.frame.label(),
        len as f64 / (1024.0 * 1024.0)
    );

    let mut summary = SuiteSummary::new(
        format!("latency/{}", config.frame.label()),
        len,
    );
    for i in 0..config.iterations {
        let outcome = publisher.send_random(len, false)?;
        let record = outcome.to_record(i);
        debug!(
            "[{i}] host copy {} ns, round trip {} ns, success {}",
            record.host_copy_ns, record.round_trip_ns, record.success
        );
        if (i + 1) % 100 == 0 || config.iterations <= 10 {
            info!("latency progress: {}/{}", i + 1, config.iterations);
        }
        summary.add(&record);
        emit(&record);
    }

    summary.log_breakdown();
    Ok(summary)
}

/// Run the bandwidth suite: N iterations per payload size, sizes above
/// the mapped capacity skipped.
pub fn run_bandwidth(
    publisher: &mut Publisher,
    config: &BandwidthSuiteConfig,
    emit: &mut dyn FnMut(&IterationRecord),
) -> WriterResult<Vec<SuiteSummary>> {
    let capacity = publisher.payload_capacity();
    let settle = Duration::from_millis(config.settle_ms);
    let mut summaries = Vec::new();

    for frame in &config.frames {
        let len = frame.bytes();
        if len > capacity {
            warn!(
                "skipping {} ({} bytes): exceeds payload capacity {}",
                frame.label(),
                len,
                capacity
            );
            continue;
        }

        info!(
            "bandwidth suite: {} iterations of {} ({:.2} MiB)",
            config.iterations,
            frame.label(),
            len as f64 / (1024.0 * 1024.0)
        );

        let mut summary = SuiteSummary::new(format!("bandwidth/{}", frame.label()), len);
        for i in 0..config.iterations {
            if i > 0 && !settle.is_zero() {
                std::thread::sleep(settle);
            }
            let outcome = publisher.send_random(len, true)?;
            let record = outcome.to_record(i);
            debug!(
                "[{} {i}] read+write {} ns, verify {} ns, success {}",
                frame.label(),
                record.read_write_ns,
                record.verify_ns,
                record.success
            );
            summary.add(&record);
            emit(&record);
        }

        summary.log_breakdown();
        summaries.push(summary);
    }

    Ok(summaries)
}
