//! Suite-level statistics.
//!
//! Accumulates avg/min/max per metric across a suite's records and logs
//! the overhead breakdown the way the per-iteration records alone cannot
//! show it. Statistics cover successful iterations only; the success rate
//! itself is reported separately.

use tracing::info;

use ivb::record::IterationRecord;

#[derive(Debug, Clone, Copy)]
struct Stat {
    sum: u128,
    min: u64,
    max: u64,
}

impl Stat {
    const fn new() -> Self {
        Self {
            sum: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    fn add(&mut self, value: u64) {
        self.sum += value as u128;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn avg(&self, n: u32) -> u64 {
        if n == 0 {
            0
        } else {
            (self.sum / n as u128) as u64
        }
    }
}

/// Accumulated statistics for one suite (or one payload size within the
/// bandwidth suite).
#[derive(Debug, Clone)]
pub struct SuiteSummary {
    /// Suite or payload-size label.
    pub label: String,
    /// Payload size in bytes.
    pub payload_bytes: usize,
    /// Iterations attempted.
    pub attempted: u32,
    /// Iterations that completed with a matching digest.
    pub successful: u32,
    host_copy: Stat,
    round_trip: Stat,
    notification: Stat,
    hot_read: Stat,
    cold_read: Stat,
    read_write: Stat,
    verify: Stat,
    total: Stat,
}

impl SuiteSummary {
    /// Create an empty summary.
    pub fn new(label: impl Into<String>, payload_bytes: usize) -> Self {
        Self {
            label: label.into(),
            payload_bytes,
            attempted: 0,
            successful: 0,
            host_copy: Stat::new(),
            round_trip: Stat::new(),
            notification: Stat::new(),
            hot_read: Stat::new(),
            cold_read: Stat::new(),
            read_write: Stat::new(),
            verify: Stat::new(),
            total: Stat::new(),
        }
    }

    /// Fold one record in.
    pub fn add(&mut self, record: &IterationRecord) {
        self.attempted += 1;
        if !record.success {
            return;
        }
        self.successful += 1;
        self.host_copy.add(record.host_copy_ns);
        self.round_trip.add(record.round_trip_ns);
        self.notification.add(record.notification_est_ns);
        self.hot_read.add(record.hot_read_ns);
        self.cold_read.add(record.cold_read_ns);
        self.read_write.add(record.read_write_ns);
        self.verify.add(record.verify_ns);
        self.total.add(record.total_ns);
    }

    /// Average end-to-end nanoseconds (host copy + round trip).
    pub fn avg_end_to_end_ns(&self) -> u64 {
        self.host_copy.avg(self.successful) + self.round_trip.avg(self.successful)
    }

    /// Average bandwidth in MiB/s for a phase averaging `avg_ns`.
    fn bandwidth_mib_s(&self, avg_ns: u64) -> f64 {
        if avg_ns == 0 {
            return 0.0;
        }
        let mib = self.payload_bytes as f64 / (1024.0 * 1024.0);
        mib / (avg_ns as f64 / 1e9)
    }

    /// Log the overhead breakdown.
    pub fn log_breakdown(&self) {
        if self.successful == 0 {
            info!(
                "{}: no successful measurements ({} attempted) - is the reader running?",
                self.label, self.attempted
            );
            return;
        }

        let n = self.successful;
        let end_to_end = self.avg_end_to_end_ns().max(1);
        let pct = |avg: u64| 100.0 * avg as f64 / end_to_end as f64;

        info!(
            "{} results: {}/{} successful, {:.2} MiB payload",
            self.label,
            n,
            self.attempted,
            self.payload_bytes as f64 / (1024.0 * 1024.0)
        );
        let host_copy = self.host_copy.avg(n);
        let notification = self.notification.avg(n);
        info!(
            "  host copy:    avg {:>9} ns ({:>8.2} us) [{:>5.1}%], {:.0} MiB/s",
            host_copy,
            host_copy as f64 / 1000.0,
            pct(host_copy),
            self.bandwidth_mib_s(host_copy)
        );
        info!(
            "  notification: avg {:>9} ns ({:>8.2} us) [{:>5.1}%]",
            notification,
            notification as f64 / 1000.0,
            pct(notification)
        );
        for (name, stat) in [
            ("hot read", &self.hot_read),
            ("cold read", &self.cold_read),
            ("read+write", &self.read_write),
            ("verify", &self.verify),
        ] {
            let avg = stat.avg(n);
            info!(
                "  {:<12}  avg {:>9} ns ({:>8.2} us), min {} / max {}",
                format!("{name}:"),
                avg,
                avg as f64 / 1000.0,
                stat.min,
                stat.max
            );
        }
        info!(
            "  read+write bandwidth: {:.0} MiB/s",
            self.bandwidth_mib_s(self.read_write.avg(n))
        );
        info!(
            "  round trip:   avg {:>9} ns, min {} / max {}",
            self.round_trip.avg(n),
            self.round_trip.min,
            self.round_trip.max
        );
        info!(
            "  end-to-end:   avg {:>9} ns ({:>8.2} us)",
            end_to_end,
            end_to_end as f64 / 1000.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(success: bool, host_copy: u64, round_trip: u64, total: u64) -> IterationRecord {
        IterationRecord {
            success,
            host_copy_ns: host_copy,
            round_trip_ns: round_trip,
            total_ns: total,
            notification_est_ns: round_trip.saturating_sub(total),
            ..IterationRecord::default()
        }
    }

    #[test]
    fn failed_records_count_attempts_only() {
        let mut summary = SuiteSummary::new("test", 4096);
        summary.add(&record(true, 100, 200, 150));
        summary.add(&record(false, 0, 0, 0));
        summary.add(&record(true, 300, 400, 350));

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.host_copy.avg(summary.successful), 200);
        assert_eq!(summary.round_trip.min, 200);
        assert_eq!(summary.round_trip.max, 400);
    }

    #[test]
    fn end_to_end_sums_host_phases() {
        let mut summary = SuiteSummary::new("test", 4096);
        summary.add(&record(true, 1_000, 2_000, 1_500));
        assert_eq!(summary.avg_end_to_end_ns(), 3_000);
    }

    #[test]
    fn empty_summary_does_not_divide_by_zero() {
        let summary = SuiteSummary::new("empty", 4096);
        assert_eq!(summary.avg_end_to_end_ns(), 0);
        summary.log_breakdown();
    }
}
