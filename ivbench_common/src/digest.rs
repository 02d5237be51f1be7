//! Payload digest interface.
//!
//! The protocol only needs `{update, finalize -> 32 bytes}`; the concrete
//! algorithm is SHA-256 because that is what the integrity test vectors
//! assume, but nothing in the wire layout depends on it beyond the
//! 32-byte width.

use sha2::{Digest as _, Sha256};

/// Digest width in bytes as fixed by the region header layout.
pub const DIGEST_BYTES: usize = 32;

/// Streaming digest over payload bytes.
///
/// `finalize` resets the hasher so one instance can be reused across
/// iterations without reallocation.
pub trait PayloadDigest {
    /// Feed bytes into the digest state.
    fn update(&mut self, bytes: &[u8]);

    /// Produce the digest and reset for the next message.
    fn finalize(&mut self) -> [u8; DIGEST_BYTES];
}

/// SHA-256 implementation of [`PayloadDigest`].
#[derive(Debug, Default, Clone)]
pub struct Sha256Digest {
    inner: Sha256,
}

impl Sha256Digest {
    /// Create a fresh hasher.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PayloadDigest for Sha256Digest {
    #[inline]
    fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    #[inline]
    fn finalize(&mut self) -> [u8; DIGEST_BYTES] {
        self.inner.finalize_reset().into()
    }
}

/// One-shot digest of a byte slice.
pub fn digest_of(bytes: &[u8]) -> [u8; DIGEST_BYTES] {
    let mut hasher = Sha256Digest::new();
    hasher.update(bytes);
    hasher.finalize()
}
