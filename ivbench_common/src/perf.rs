//! Hardware performance counter sampler.
//!
//! Wraps `perf_event_open(2)` to count cache, TLB and CPU events around
//! the reader's measurement phases. The sampler is strictly optional:
//! when the essential counters cannot be opened (no permission, no PMU in
//! the guest) the caller falls back to [`NullSampler`] and the sample
//! block in the region stays zeroed.

use std::os::unix::io::RawFd;

use tracing::debug;

// perf_event ioctl requests: _IO('$', 0), _IO('$', 1), _IO('$', 3).
const PERF_IOC_ENABLE: libc::c_ulong = 0x2400;
const PERF_IOC_DISABLE: libc::c_ulong = 0x2401;
const PERF_IOC_RESET: libc::c_ulong = 0x2403;

// Event types and configs from <linux/perf_event.h>.
const PERF_TYPE_HARDWARE: u32 = 0;
const PERF_TYPE_SOFTWARE: u32 = 1;
const PERF_TYPE_HW_CACHE: u32 = 3;
const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;
const PERF_COUNT_HW_INSTRUCTIONS: u64 = 1;
const PERF_COUNT_SW_CONTEXT_SWITCHES: u64 = 3;
const HW_CACHE_L1D: u64 = 0;
const HW_CACHE_LL: u64 = 2;
const HW_CACHE_DTLB: u64 = 3;
const HW_CACHE_OP_READ: u64 = 0;
const HW_CACHE_RESULT_ACCESS: u64 = 0;
const HW_CACHE_RESULT_MISS: u64 = 1;

// PERF_ATTR_SIZE_VER0: the original 64-byte attr, accepted by every
// kernel that has the syscall. Only the fields up to config1 exist at
// this size.
const PERF_ATTR_SIZE_VER0: u32 = 64;
const ATTR_FLAG_DISABLED: u64 = 1 << 0;
const ATTR_FLAG_EXCLUDE_HV: u64 = 1 << 6;

/// `struct perf_event_attr`, VER0 prefix.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct PerfEventAttr {
    type_: u32,
    size: u32,
    config: u64,
    sample_period: u64,
    sample_type: u64,
    read_format: u64,
    flags: u64,
    wakeup_events: u32,
    bp_type: u32,
    config1: u64,
}

/// Size of the opaque sample block in the region header.
pub const PERF_SAMPLE_BYTES: usize = 128;

/// Decoded hardware counter sample.
///
/// Rates are fixed-point ×10000 (1250 = 12.50%) so the block stays
/// float-free when copied into shared memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct PerfSample {
    /// CPU cycles spent in the sampled section.
    pub cpu_cycles: u64,
    /// Retired instructions.
    pub instructions: u64,
    /// L1 data cache read misses.
    pub l1d_misses: u64,
    /// L1 data cache read references.
    pub l1d_references: u64,
    /// Last-level cache read misses.
    pub llc_misses: u64,
    /// Last-level cache read references.
    pub llc_references: u64,
    /// Data TLB read misses.
    pub dtlb_misses: u64,
    /// Context switches observed during the section.
    pub context_switches: u64,
    /// L1 miss rate ×10000.
    pub l1d_miss_rate_x10000: u32,
    /// LLC miss rate ×10000.
    pub llc_miss_rate_x10000: u32,
    /// Instructions per cycle ×10000.
    pub ipc_x10000: u32,
    /// Cycles per payload byte ×10000.
    pub cycles_per_byte_x10000: u32,
    /// dTLB misses per L1 reference ×10000.
    pub dtlb_miss_rate_x10000: u32,
}

impl PerfSample {
    /// Pack into the fixed-size little-endian block stored in the region.
    pub fn to_bytes(&self) -> [u8; PERF_SAMPLE_BYTES] {
        let mut out = [0u8; PERF_SAMPLE_BYTES];
        let words = [
            self.cpu_cycles,
            self.instructions,
            self.l1d_misses,
            self.l1d_references,
            self.llc_misses,
            self.llc_references,
            self.dtlb_misses,
            self.context_switches,
        ];
        for (i, w) in words.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&w.to_le_bytes());
        }
        let rates = [
            self.l1d_miss_rate_x10000,
            self.llc_miss_rate_x10000,
            self.ipc_x10000,
            self.cycles_per_byte_x10000,
            self.dtlb_miss_rate_x10000,
        ];
        for (i, r) in rates.iter().enumerate() {
            let off = 64 + i * 4;
            out[off..off + 4].copy_from_slice(&r.to_le_bytes());
        }
        out
    }

    /// Decode from the fixed-size block.
    pub fn from_bytes(bytes: &[u8; PERF_SAMPLE_BYTES]) -> Self {
        let word = |i: usize| {
            u64::from_le_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap())
        };
        let rate = |i: usize| {
            let off = 64 + i * 4;
            u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap())
        };
        Self {
            cpu_cycles: word(0),
            instructions: word(1),
            l1d_misses: word(2),
            l1d_references: word(3),
            llc_misses: word(4),
            llc_references: word(5),
            dtlb_misses: word(6),
            context_switches: word(7),
            l1d_miss_rate_x10000: rate(0),
            llc_miss_rate_x10000: rate(1),
            ipc_x10000: rate(2),
            cycles_per_byte_x10000: rate(3),
            dtlb_miss_rate_x10000: rate(4),
        }
    }
}

/// Counter sampler driven around a measured section.
pub trait PerfSampler {
    /// Reset and enable the counters.
    fn start(&mut self);

    /// Disable the counters and collect a sample.
    ///
    /// `data_len` is the payload size used for the cycles-per-byte rate.
    fn stop(&mut self, data_len: usize) -> PerfSample;
}

/// Sampler that always returns a zeroed sample.
#[derive(Debug, Default)]
pub struct NullSampler;

impl PerfSampler for NullSampler {
    fn start(&mut self) {}

    fn stop(&mut self, _data_len: usize) -> PerfSample {
        PerfSample::default()
    }
}

fn hw_cache_config(cache_id: u64, op_id: u64, result_id: u64) -> u64 {
    cache_id | (op_id << 8) | (result_id << 16)
}

fn open_counter(type_: u32, config: u64) -> Option<RawFd> {
    let attr = PerfEventAttr {
        type_,
        size: PERF_ATTR_SIZE_VER0,
        config,
        flags: ATTR_FLAG_DISABLED | ATTR_FLAG_EXCLUDE_HV,
        ..PerfEventAttr::default()
    };

    let fd = unsafe {
        libc::syscall(
            libc::SYS_perf_event_open,
            &attr as *const PerfEventAttr,
            0,   // this process
            -1,  // any CPU
            -1,  // no group
            0u64,
        )
    } as RawFd;

    if fd >= 0 {
        Some(fd)
    } else {
        None
    }
}

fn read_counter(fd: Option<RawFd>) -> u64 {
    let Some(fd) = fd else { return 0 };
    let mut value: u64 = 0;
    let n = unsafe {
        libc::read(fd, &mut value as *mut u64 as *mut libc::c_void, 8)
    };
    if n == 8 {
        value
    } else {
        0
    }
}

fn each_fd(fds: &[Option<RawFd>], request: libc::c_ulong) {
    for fd in fds.iter().flatten() {
        unsafe {
            libc::ioctl(*fd, request, 0);
        }
    }
}

/// `perf_event_open` backed sampler.
///
/// Essential counters are cycles, instructions and L1D misses; if any of
/// those cannot be opened, construction fails and the caller should use
/// [`NullSampler`]. The remaining counters are best-effort and read as 0
/// where unavailable.
#[derive(Debug)]
pub struct HwSampler {
    cycles: Option<RawFd>,
    instructions: Option<RawFd>,
    l1d_misses: Option<RawFd>,
    l1d_references: Option<RawFd>,
    llc_misses: Option<RawFd>,
    llc_references: Option<RawFd>,
    dtlb_misses: Option<RawFd>,
    context_switches: Option<RawFd>,
}

impl HwSampler {
    /// Try to open the counter set for the calling process.
    pub fn try_new() -> Option<Self> {
        let sampler = Self {
            cycles: open_counter(PERF_TYPE_HARDWARE, PERF_COUNT_HW_CPU_CYCLES),
            instructions: open_counter(PERF_TYPE_HARDWARE, PERF_COUNT_HW_INSTRUCTIONS),
            l1d_misses: open_counter(
                PERF_TYPE_HW_CACHE,
                hw_cache_config(HW_CACHE_L1D, HW_CACHE_OP_READ, HW_CACHE_RESULT_MISS),
            ),
            l1d_references: open_counter(
                PERF_TYPE_HW_CACHE,
                hw_cache_config(HW_CACHE_L1D, HW_CACHE_OP_READ, HW_CACHE_RESULT_ACCESS),
            ),
            llc_misses: open_counter(
                PERF_TYPE_HW_CACHE,
                hw_cache_config(HW_CACHE_LL, HW_CACHE_OP_READ, HW_CACHE_RESULT_MISS),
            ),
            llc_references: open_counter(
                PERF_TYPE_HW_CACHE,
                hw_cache_config(HW_CACHE_LL, HW_CACHE_OP_READ, HW_CACHE_RESULT_ACCESS),
            ),
            dtlb_misses: open_counter(
                PERF_TYPE_HW_CACHE,
                hw_cache_config(HW_CACHE_DTLB, HW_CACHE_OP_READ, HW_CACHE_RESULT_MISS),
            ),
            context_switches: open_counter(PERF_TYPE_SOFTWARE, PERF_COUNT_SW_CONTEXT_SWITCHES),
        };

        if sampler.cycles.is_none()
            || sampler.instructions.is_none()
            || sampler.l1d_misses.is_none()
        {
            debug!("essential perf counters unavailable, sampler disabled");
            return None;
        }

        Some(sampler)
    }

    fn all_fds(&self) -> [Option<RawFd>; 8] {
        [
            self.cycles,
            self.instructions,
            self.l1d_misses,
            self.l1d_references,
            self.llc_misses,
            self.llc_references,
            self.dtlb_misses,
            self.context_switches,
        ]
    }
}

impl PerfSampler for HwSampler {
    fn start(&mut self) {
        let fds = self.all_fds();
        each_fd(&fds, PERF_IOC_RESET);
        each_fd(&fds, PERF_IOC_ENABLE);
    }

    fn stop(&mut self, data_len: usize) -> PerfSample {
        each_fd(&self.all_fds(), PERF_IOC_DISABLE);

        let mut sample = PerfSample {
            cpu_cycles: read_counter(self.cycles),
            instructions: read_counter(self.instructions),
            l1d_misses: read_counter(self.l1d_misses),
            l1d_references: read_counter(self.l1d_references),
            llc_misses: read_counter(self.llc_misses),
            llc_references: read_counter(self.llc_references),
            dtlb_misses: read_counter(self.dtlb_misses),
            context_switches: read_counter(self.context_switches),
            ..PerfSample::default()
        };

        let rate = |num: u64, den: u64| -> u32 {
            if den == 0 {
                0
            } else {
                ((num as u128 * 10_000) / den as u128).min(u32::MAX as u128) as u32
            }
        };
        sample.l1d_miss_rate_x10000 = rate(sample.l1d_misses, sample.l1d_references);
        sample.llc_miss_rate_x10000 = rate(sample.llc_misses, sample.llc_references);
        sample.ipc_x10000 = rate(sample.instructions, sample.cpu_cycles);
        sample.cycles_per_byte_x10000 = rate(sample.cpu_cycles, data_len as u64);
        sample.dtlb_miss_rate_x10000 = rate(sample.dtlb_misses, sample.l1d_references);

        sample
    }
}

impl Drop for HwSampler {
    fn drop(&mut self) {
        for fd in self.all_fds().iter().flatten() {
            unsafe {
                libc::close(*fd);
            }
        }
    }
}

/// Best available sampler for this process: hardware counters when
/// permitted, otherwise the null sampler.
pub fn default_sampler() -> Box<dyn PerfSampler + Send> {
    match HwSampler::try_new() {
        Some(hw) => Box::new(hw),
        None => Box::new(NullSampler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_matches_ver0_abi() {
        assert_eq!(std::mem::size_of::<PerfEventAttr>() as u32, PERF_ATTR_SIZE_VER0);
    }

    #[test]
    fn sample_roundtrips_through_bytes() {
        let sample = PerfSample {
            cpu_cycles: 123_456_789,
            instructions: 987_654_321,
            l1d_misses: 42,
            l1d_references: 4200,
            llc_misses: 7,
            llc_references: 700,
            dtlb_misses: 3,
            context_switches: 1,
            l1d_miss_rate_x10000: 100,
            llc_miss_rate_x10000: 100,
            ipc_x10000: 80_000,
            cycles_per_byte_x10000: 5,
            dtlb_miss_rate_x10000: 7,
        };
        let bytes = sample.to_bytes();
        assert_eq!(PerfSample::from_bytes(&bytes), sample);
    }

    #[test]
    fn zero_sample_packs_to_zero_block() {
        assert_eq!(PerfSample::default().to_bytes(), [0u8; PERF_SAMPLE_BYTES]);
    }

    #[test]
    fn null_sampler_returns_zeroed_sample() {
        let mut sampler = NullSampler;
        sampler.start();
        assert_eq!(sampler.stop(4096), PerfSample::default());
    }

    #[test]
    fn default_sampler_is_usable() {
        // Hardware counters may be unavailable in CI; either backend must
        // produce a sample without panicking.
        let mut sampler = default_sampler();
        sampler.start();
        let _ = sampler.stop(64);
    }
}
