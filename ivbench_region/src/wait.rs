//! Bounded polling waits.
//!
//! No blocking primitive spans the host/guest boundary in the
//! `ivshmem-plain` configuration, so every synchronisation point is a
//! poll loop with a short OS sleep. Every wait carries a bound; expiring
//! the bound is reported as data, not panicked on.

use std::time::Duration;

use ivb::timer::Stopwatch;

use crate::error::{RegionError, RegionResult};

/// Poll `cond` every `poll` until it returns true or `timeout` expires.
///
/// `what` names the awaited condition in the timeout error. The condition
/// closure performs the volatile state load itself; on success the caller
/// is expected to fence before loading dependent fields.
pub fn wait_for(
    what: &'static str,
    timeout: Duration,
    poll: Duration,
    mut cond: impl FnMut() -> bool,
) -> RegionResult<()> {
    let sw = Stopwatch::start()?;
    let timeout_ns = timeout.as_nanos() as u64;
    loop {
        if cond() {
            return Ok(());
        }
        let elapsed = sw.elapsed_ns()?;
        if elapsed >= timeout_ns {
            return Err(RegionError::WaitTimeout {
                awaited: what,
                waited_ms: elapsed / 1_000_000,
            });
        }
        std::thread::sleep(poll);
    }
}

/// Like [`wait_for`], but with an additional escape condition that makes
/// the wait succeed with `false` (used for `test_complete`).
///
/// Returns `Ok(true)` when `cond` matched, `Ok(false)` when `escape`
/// fired first.
pub fn wait_for_or(
    what: &'static str,
    timeout: Duration,
    poll: Duration,
    mut cond: impl FnMut() -> bool,
    mut escape: impl FnMut() -> bool,
) -> RegionResult<bool> {
    let sw = Stopwatch::start()?;
    let timeout_ns = timeout.as_nanos() as u64;
    loop {
        if cond() {
            return Ok(true);
        }
        if escape() {
            return Ok(false);
        }
        let elapsed = sw.elapsed_ns()?;
        if elapsed >= timeout_ns {
            return Err(RegionError::WaitTimeout {
                awaited: what,
                waited_ms: elapsed / 1_000_000,
            });
        }
        std::thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_micros(10);

    #[test]
    fn immediate_condition_never_sleeps() {
        let result = wait_for("always true", Duration::from_millis(1), POLL, || true);
        assert!(result.is_ok());
    }

    #[test]
    fn timeout_is_reported_with_context() {
        let result = wait_for("never true", Duration::from_millis(20), POLL, || false);
        match result {
            Err(RegionError::WaitTimeout { awaited, waited_ms }) => {
                assert_eq!(awaited, "never true");
                assert!(waited_ms >= 20);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn condition_becoming_true_is_observed() {
        let start = std::time::Instant::now();
        let result = wait_for("eventually true", Duration::from_secs(1), POLL, || {
            start.elapsed() > Duration::from_millis(5)
        });
        assert!(result.is_ok());
    }

    #[test]
    fn escape_wins_over_timeout() {
        let matched = wait_for_or(
            "condition",
            Duration::from_secs(1),
            POLL,
            || false,
            || true,
        )
        .unwrap();
        assert!(!matched);
    }

    #[test]
    fn condition_wins_over_escape() {
        let matched = wait_for_or(
            "condition",
            Duration::from_secs(1),
            POLL,
            || true,
            || true,
        )
        .unwrap();
        assert!(matched);
    }
}
