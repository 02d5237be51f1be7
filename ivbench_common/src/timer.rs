//! Monotonic nanosecond clock.
//!
//! All durations shipped across the domain boundary are measured on the
//! local peer's `CLOCK_MONOTONIC`. Timestamps are never compared between
//! peers; only durations travel. Clock failures propagate to the caller
//! rather than panicking mid-protocol.

use nix::time::{clock_gettime, ClockId};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Current monotonic time in nanoseconds.
#[inline]
pub fn now_ns() -> Result<u64, nix::Error> {
    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
    Ok(ts.tv_sec() as u64 * NANOS_PER_SEC + ts.tv_nsec() as u64)
}

/// Simple interval stopwatch over [`now_ns`].
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: u64,
}

impl Stopwatch {
    /// Start a new stopwatch at the current instant.
    #[inline]
    pub fn start() -> Result<Self, nix::Error> {
        Ok(Self { start: now_ns()? })
    }

    /// Nanoseconds elapsed since `start()`.
    #[inline]
    pub fn elapsed_ns(&self) -> Result<u64, nix::Error> {
        Ok(now_ns()?.saturating_sub(self.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let a = now_ns().unwrap();
        let b = now_ns().unwrap();
        assert!(b >= a);
    }

    #[test]
    fn stopwatch_measures_sleep() {
        let sw = Stopwatch::start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let elapsed = sw.elapsed_ns().unwrap();
        assert!(elapsed >= 5_000_000, "elapsed {elapsed} ns");
    }
}
