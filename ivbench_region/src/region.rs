//! Volatile field accessors over the mapped frame slot.
//!
//! Every state and magic word is read and written as a single volatile
//! 32-bit operation; bulk fields (digest, timings, perf sample, payload)
//! move with plain copies bracketed by the callers' fences. One fence
//! kind is used throughout: a full barrier.
//!
//! Each peer constructs exactly one `Region` over its own mapping and
//! only ever calls the setters for the fields it owns. Nothing enforces
//! that split at the type level across processes; the ownership tests in
//! the peer crates exercise it.

use std::sync::atomic::{fence, Ordering};

use tracing::{info, warn};

use ivb::perf::PERF_SAMPLE_BYTES;

use crate::error::{RegionError, RegionResult};
use crate::layout::{
    self, CACHED_VERIFY_NS_OFFSET, COLD_READ_NS_OFFSET, COPY_NS_OFFSET, DATA_SIZE_OFFSET,
    DIGEST_OFFSET, ERROR_CODE_OFFSET, FLAGS_OFFSET, HOT_READ_NS_OFFSET, MAGIC_OFFSET,
    PAYLOAD_OFFSET, PERF_SAMPLE_OFFSET, READER_STATE_OFFSET, READ_WRITE_NS_OFFSET,
    SEQUENCE_OFFSET, TEST_COMPLETE_OFFSET, TOTAL_NS_OFFSET, VERIFY_NS_OFFSET,
    WRITER_STATE_OFFSET,
};
use crate::map::RegionMap;
use crate::state::{reader_state_label, writer_state_label, ReaderState, WriterState};

/// Reader-measured durations shipped back through the region [ns].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    /// Legacy aggregate; equals `read_write_ns`.
    pub copy_ns: u64,
    /// Digest of the reader-local copy.
    pub verify_ns: u64,
    /// PROCESSING entry to just before ACKNOWLEDGED.
    pub total_ns: u64,
    /// Strided read with the payload cache-resident.
    pub hot_read_ns: u64,
    /// Strided read after line eviction.
    pub cold_read_ns: u64,
    /// Bulk copy to the reader-local buffer after eviction.
    pub read_write_ns: u64,
    /// Same measurement as `verify_ns`; the local copy is in-cache.
    pub cached_verify_ns: u64,
}

/// The frame slot, viewed through one peer's mapping.
#[derive(Debug)]
pub struct Region {
    map: RegionMap,
}

impl Region {
    /// Wrap a mapping, validating it can hold the header.
    pub fn over(map: RegionMap) -> RegionResult<Self> {
        if map.len() < layout::HEADER_BYTES {
            return Err(RegionError::RegionTooSmall {
                size: map.len(),
                header: layout::HEADER_BYTES,
            });
        }
        Ok(Self { map })
    }

    /// The underlying mapping.
    #[inline]
    pub fn map(&self) -> &RegionMap {
        &self.map
    }

    /// Payload capacity of this mapping in bytes.
    #[inline]
    pub fn payload_capacity(&self) -> usize {
        layout::payload_capacity(self.map.len())
    }

    /// Full memory barrier.
    ///
    /// Issued after every store that precedes a state transition and
    /// before every load that follows one.
    #[inline]
    pub fn fence(&self) {
        fence(Ordering::SeqCst);
    }

    // ─── Single-word volatile access ────────────────────────────────

    #[inline]
    fn load_u32(&self, offset: usize) -> u32 {
        debug_assert!(offset + 4 <= self.map.len());
        debug_assert_eq!(offset % 4, 0);
        unsafe { std::ptr::read_volatile(self.map.as_ptr().add(offset) as *const u32) }
    }

    #[inline]
    fn store_u32(&mut self, offset: usize, value: u32) {
        debug_assert!(offset + 4 <= self.map.len());
        debug_assert_eq!(offset % 4, 0);
        unsafe {
            std::ptr::write_volatile(self.map.as_mut_ptr().add(offset) as *mut u32, value);
        }
    }

    #[inline]
    fn load_u64(&self, offset: usize) -> u64 {
        debug_assert!(offset + 8 <= self.map.len());
        debug_assert_eq!(offset % 8, 0);
        unsafe { std::ptr::read_volatile(self.map.as_ptr().add(offset) as *const u64) }
    }

    #[inline]
    fn store_u64(&mut self, offset: usize, value: u64) {
        debug_assert!(offset + 8 <= self.map.len());
        debug_assert_eq!(offset % 8, 0);
        unsafe {
            std::ptr::write_volatile(self.map.as_mut_ptr().add(offset) as *mut u64, value);
        }
    }

    // ─── Shared gate words ──────────────────────────────────────────

    /// Current `magic` value.
    #[inline]
    pub fn magic(&self) -> u32 {
        self.load_u32(MAGIC_OFFSET)
    }

    /// Store `magic` (writer only).
    #[inline]
    pub fn set_magic(&mut self, value: u32) {
        self.store_u32(MAGIC_OFFSET, value);
    }

    /// Whether the writer has signalled test completion.
    #[inline]
    pub fn test_complete(&self) -> bool {
        self.load_u32(TEST_COMPLETE_OFFSET) == 1
    }

    /// Store the completion flag (writer only).
    #[inline]
    pub fn set_test_complete(&mut self, complete: bool) {
        self.store_u32(TEST_COMPLETE_OFFSET, complete as u32);
    }

    // ─── State words ────────────────────────────────────────────────

    /// Raw writer state word.
    #[inline]
    pub fn writer_state_raw(&self) -> u32 {
        self.load_u32(WRITER_STATE_OFFSET)
    }

    /// Decoded writer state, `None` for values outside the enum (a stale
    /// or garbage region).
    #[inline]
    pub fn writer_state(&self) -> Option<WriterState> {
        WriterState::from_u32(self.writer_state_raw())
    }

    /// Store the writer state word (writer only), logging the transition
    /// and fencing afterwards.
    pub fn set_writer_state(&mut self, state: WriterState) {
        let old = self.writer_state_raw();
        if old != state as u32 {
            info!("writer state {} -> {}", writer_state_label(old), state);
            self.store_u32(WRITER_STATE_OFFSET, state as u32);
            self.fence();
        }
    }

    /// Raw reader state word.
    #[inline]
    pub fn reader_state_raw(&self) -> u32 {
        self.load_u32(READER_STATE_OFFSET)
    }

    /// Decoded reader state, `None` for values outside the enum.
    #[inline]
    pub fn reader_state(&self) -> Option<ReaderState> {
        ReaderState::from_u32(self.reader_state_raw())
    }

    /// Store the reader state word (reader only), logging the transition
    /// and fencing afterwards.
    pub fn set_reader_state(&mut self, state: ReaderState) {
        let old = self.reader_state_raw();
        if old != state as u32 {
            info!("reader state {} -> {}", reader_state_label(old), state);
            self.store_u32(READER_STATE_OFFSET, state as u32);
            self.fence();
        }
    }

    // ─── Message header (writer-owned) ──────────────────────────────

    /// Current message sequence number.
    #[inline]
    pub fn sequence(&self) -> u32 {
        self.load_u32(SEQUENCE_OFFSET)
    }

    /// Store the sequence number (writer only).
    #[inline]
    pub fn set_sequence(&mut self, sequence: u32) {
        self.store_u32(SEQUENCE_OFFSET, sequence);
    }

    /// Advertised payload length.
    #[inline]
    pub fn data_size(&self) -> u32 {
        self.load_u32(DATA_SIZE_OFFSET)
    }

    /// Store the payload length (writer only).
    #[inline]
    pub fn set_data_size(&mut self, size: u32) {
        self.store_u32(DATA_SIZE_OFFSET, size);
    }

    /// Expected payload digest.
    pub fn digest(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.map.as_ptr().add(DIGEST_OFFSET),
                out.as_mut_ptr(),
                32,
            );
        }
        out
    }

    /// Store the payload digest (writer only).
    pub fn set_digest(&mut self, digest: &[u8; 32]) {
        unsafe {
            std::ptr::copy_nonoverlapping(
                digest.as_ptr(),
                self.map.as_mut_ptr().add(DIGEST_OFFSET),
                32,
            );
        }
    }

    // ─── Reader results (reader-owned) ──────────────────────────────

    /// Reader-reported error code; valid only while the reader is in
    /// ACKNOWLEDGED for the advertised sequence.
    #[inline]
    pub fn error_code(&self) -> u32 {
        self.load_u32(ERROR_CODE_OFFSET)
    }

    /// Store the error code (reader only).
    #[inline]
    pub fn set_error_code(&mut self, code: u32) {
        self.store_u32(ERROR_CODE_OFFSET, code);
    }

    /// Reader flags word.
    #[inline]
    pub fn flags(&self) -> u32 {
        self.load_u32(FLAGS_OFFSET)
    }

    /// Store the flags word (reader only).
    #[inline]
    pub fn set_flags(&mut self, flags: u32) {
        self.store_u32(FLAGS_OFFSET, flags);
    }

    /// Read the full timing block.
    pub fn timings(&self) -> Timings {
        Timings {
            copy_ns: self.load_u64(COPY_NS_OFFSET),
            verify_ns: self.load_u64(VERIFY_NS_OFFSET),
            total_ns: self.load_u64(TOTAL_NS_OFFSET),
            hot_read_ns: self.load_u64(HOT_READ_NS_OFFSET),
            cold_read_ns: self.load_u64(COLD_READ_NS_OFFSET),
            read_write_ns: self.load_u64(READ_WRITE_NS_OFFSET),
            cached_verify_ns: self.load_u64(CACHED_VERIFY_NS_OFFSET),
        }
    }

    /// Store the full timing block (reader only).
    pub fn set_timings(&mut self, timings: &Timings) {
        self.store_u64(COPY_NS_OFFSET, timings.copy_ns);
        self.store_u64(VERIFY_NS_OFFSET, timings.verify_ns);
        self.store_u64(TOTAL_NS_OFFSET, timings.total_ns);
        self.store_u64(HOT_READ_NS_OFFSET, timings.hot_read_ns);
        self.store_u64(COLD_READ_NS_OFFSET, timings.cold_read_ns);
        self.store_u64(READ_WRITE_NS_OFFSET, timings.read_write_ns);
        self.store_u64(CACHED_VERIFY_NS_OFFSET, timings.cached_verify_ns);
    }

    /// Read the opaque perf sample block.
    pub fn perf_sample(&self) -> [u8; PERF_SAMPLE_BYTES] {
        let mut out = [0u8; PERF_SAMPLE_BYTES];
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.map.as_ptr().add(PERF_SAMPLE_OFFSET),
                out.as_mut_ptr(),
                PERF_SAMPLE_BYTES,
            );
        }
        out
    }

    /// Store the opaque perf sample block (reader only).
    pub fn set_perf_sample(&mut self, sample: &[u8; PERF_SAMPLE_BYTES]) {
        unsafe {
            std::ptr::copy_nonoverlapping(
                sample.as_ptr(),
                self.map.as_mut_ptr().add(PERF_SAMPLE_OFFSET),
                PERF_SAMPLE_BYTES,
            );
        }
    }

    // ─── Payload ────────────────────────────────────────────────────

    /// Borrow the first `len` payload bytes.
    pub fn payload(&self, len: usize) -> RegionResult<&[u8]> {
        self.check_payload_len(len)?;
        Ok(unsafe {
            std::slice::from_raw_parts(self.map.as_ptr().add(PAYLOAD_OFFSET), len)
        })
    }

    /// Borrow the first `len` payload bytes mutably (writer only).
    pub fn payload_mut(&mut self, len: usize) -> RegionResult<&mut [u8]> {
        self.check_payload_len(len)?;
        Ok(unsafe {
            std::slice::from_raw_parts_mut(self.map.as_mut_ptr().add(PAYLOAD_OFFSET), len)
        })
    }

    fn check_payload_len(&self, len: usize) -> RegionResult<()> {
        let capacity = self.payload_capacity();
        if len > capacity {
            return Err(RegionError::PayloadTooLarge {
                requested: len,
                capacity,
            });
        }
        Ok(())
    }

    // ─── Writer initialisation ──────────────────────────────────────

    /// Bring a possibly-stale region to the ready state (writer only).
    ///
    /// Zeroes `magic` first so a reader that maps mid-initialisation
    /// cannot mistake leftover bytes for a valid message, clears the
    /// writer-owned header words, then publishes the ready token. Each
    /// step is fenced. Reader-owned fields are left alone; the reader
    /// overwrites them before every ACKNOWLEDGED.
    pub fn initialise(&mut self, ready_magic: u32) {
        if let Some(state) = self.reader_state() {
            if state != ReaderState::Uninitialised {
                info!("reader already up (state {state}), re-initialising anyway");
            }
        } else {
            warn!(
                "stale reader state word 0x{:08X}, re-initialising",
                self.reader_state_raw()
            );
        }

        self.set_magic(0);
        self.set_writer_state(WriterState::Initialising);
        self.fence();

        self.set_sequence(0);
        self.set_data_size(0);
        self.set_test_complete(false);
        self.set_digest(&[0u8; 32]);
        self.fence();

        self.set_magic(ready_magic);
        self.set_writer_state(WriterState::Ready);
        self.fence();
    }
}
