//! Image backing: maps the fixed-size disk image into memory (spec §4.A).

use crate::error::ImageError;
use crate::layout::{NUFS_SIZE, PAGE_SIZE};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::Path;

/// The memory-mapped backing store. Addressable by page number `0..PAGE_COUNT`.
pub struct Image {
    mmap: MmapMut,
    /// Whether the image was freshly created (and therefore zero-filled) by
    /// this call, as opposed to an existing image being reopened.
    freshly_formatted: bool,
}

impl Image {
    /// Opens `path`, creating it if absent. An existing file is resized up to
    /// [`NUFS_SIZE`] if smaller (never truncated down) and is not re-zeroed.
    /// A newly created file is zero-filled.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(ImageError::Open)?;
        let len = file.metadata().map_err(ImageError::Open)?.len();
        let freshly_formatted = !existed || len == 0;
        if len < NUFS_SIZE as u64 {
            file.set_len(NUFS_SIZE as u64).map_err(|source| ImageError::Resize {
                expected: NUFS_SIZE as u64,
                source,
            })?;
        }
        let mut mmap = unsafe { MmapOptions::new().len(NUFS_SIZE).map_mut(&file) }
            .map_err(ImageError::Map)?;
        if freshly_formatted {
            mmap.fill(0);
        }
        Ok(Self {
            mmap,
            freshly_formatted,
        })
    }

    /// Whether this image was freshly created and zero-filled by this `open`
    /// call (as opposed to an existing formatted image being reopened).
    pub fn is_freshly_formatted(&self) -> bool {
        self.freshly_formatted
    }

    /// Borrows page `n` immutably.
    pub fn page(&self, n: u32) -> &[u8] {
        let off = n as usize * PAGE_SIZE;
        &self.mmap[off..off + PAGE_SIZE]
    }

    /// Borrows page `n` mutably.
    pub fn page_mut(&mut self, n: u32) -> &mut [u8] {
        let off = n as usize * PAGE_SIZE;
        &mut self.mmap[off..off + PAGE_SIZE]
    }

    /// Borrows the whole mapped region, for layout that spans page 0 and the
    /// inode table contiguously (bitmap + inode array).
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Borrows the whole mapped region mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}
