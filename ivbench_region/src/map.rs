//! Backing object mapping.
//!
//! The region lives at offset 0 of a byte-addressable, shared, read-write
//! mapping. Two provider families exist: a file on a shared-memory
//! filesystem (host side) and a PCI BAR resource node (guest side). On a
//! guest without the device node the reader falls back to the shared file
//! so the whole stack can be smoke-tested on one machine.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::info;

use crate::error::{RegionError, RegionResult};

/// Which provider family backs the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    /// File on a shared-memory filesystem.
    SharedFile(PathBuf),
    /// PCI BAR resource node.
    PciResource(PathBuf),
}

impl Backing {
    /// Path of the backing object.
    pub fn path(&self) -> &Path {
        match self {
            Backing::SharedFile(p) | Backing::PciResource(p) => p,
        }
    }
}

/// A read-write mapping of the shared region.
#[derive(Debug)]
pub struct RegionMap {
    mmap: MmapMut,
    len: usize,
    backing: Backing,
}

impl RegionMap {
    /// Create (or truncate) a backing file of exactly `size` bytes and map
    /// it. Host-side setup and test harnesses use this; the file starts
    /// zeroed, which is the uninitialised region state.
    pub fn create(path: &Path, size: usize) -> RegionResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.set_len(size as u64)?;

        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
        info!("created region {} ({} bytes)", path.display(), size);

        Ok(Self {
            mmap,
            len: size,
            backing: Backing::SharedFile(path.to_path_buf()),
        })
    }

    /// Map an existing backing object, requiring at least `size` bytes.
    pub fn open(path: &Path, size: usize) -> RegionResult<Self> {
        Self::open_backing(Backing::SharedFile(path.to_path_buf()), size)
    }

    /// Map the PCI resource node when present, otherwise fall back to the
    /// shared file. Logs which provider was chosen.
    pub fn open_preferring_pci(
        pci_resource: &Path,
        fallback: &Path,
        size: usize,
    ) -> RegionResult<Self> {
        if pci_resource.exists() {
            Self::open_backing(Backing::PciResource(pci_resource.to_path_buf()), size)
        } else {
            info!(
                "PCI resource {} not found, falling back to shared file {}",
                pci_resource.display(),
                fallback.display()
            );
            Self::open_backing(Backing::SharedFile(fallback.to_path_buf()), size)
        }
    }

    fn open_backing(backing: Backing, size: usize) -> RegionResult<Self> {
        let path = backing.path();
        if !path.exists() {
            return Err(RegionError::BackingNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if matches!(backing, Backing::PciResource(_)) {
            // Uncached device access; matches how the BAR is meant to be
            // driven.
            options.custom_flags(libc::O_SYNC);
        }
        let file = options.open(path)?;

        let actual = file.metadata()?.len();
        if actual < size as u64 {
            return Err(RegionError::SizeMismatch {
                path: path.to_path_buf(),
                actual,
                expected: size as u64,
            });
        }

        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
        info!(
            "mapped region {} ({} of {} bytes)",
            path.display(),
            size,
            actual
        );

        Ok(Self {
            mmap,
            len: size,
            backing,
        })
    }

    /// Mapped length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty (it never is for a valid region).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Provider that backs this mapping.
    #[inline]
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// Base pointer of the mapping.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    /// Mutable base pointer of the mapping.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }
}
