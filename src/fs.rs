//! The [`Filesystem`] value: owns the mapped image and is the single
//! non-global state threaded through every operation (spec §9 "Global state").

use crate::bitmap;
use crate::error::{FsError, FsResult, ImageError};
use crate::image::Image;
use crate::inode::{RawInode, DIR_BIT};
use crate::layout::{metadata_page_count, PAGE_COUNT, PAGE_SIZE, ROOT_INUM, SENTINEL_INUM};
use log::{info, trace};
use std::path::Path;

/// Default permission bits applied to a freshly formatted root directory.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Owns the mapped disk image. Every filesystem operation (§4.G) is a method
/// on this type; there is no ambient/global mutable state.
pub struct Filesystem {
    image: Image,
}

impl Filesystem {
    /// Opens (or creates and formats) the image at `path` (spec §4.A, §10.3).
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let image = Image::open(path)?;
        let mut fs = Self { image };
        if fs.image.is_freshly_formatted() {
            fs.format();
        }
        info!(
            "mounted image with {} free pages of {PAGE_COUNT}, {} free inodes of {}",
            fs.free_page_count(),
            fs.free_inode_count(),
            crate::layout::inode_count(),
        );
        Ok(fs)
    }

    /// Lays out a freshly zero-filled image: marks every page the bitmap and
    /// inode table occupy as in use, installs the sentinel inode covering
    /// them, and sets up the root directory at inode 1 with `size == 0` and
    /// no data pages (spec §9 "Directory size of root" — the first
    /// `directory_put` allocates it).
    fn format(&mut self) {
        let metadata_pages = metadata_page_count();
        assert!(
            metadata_pages <= 2,
            "sentinel has only two direct pointers; indirect metadata pages are unsupported"
        );
        let mut sentinel = RawInode::new(0, 0);
        for i in 0..metadata_pages {
            bitmap::set(self.image.page_mut(0), i, true);
            sentinel.ptrs[i] = i as i32;
        }
        sentinel.size = (metadata_pages * PAGE_SIZE) as i64;
        self.write_inode(SENTINEL_INUM, &sentinel);

        // Root starts empty (size 0, no data pages); the first `directory_put`
        // allocates its first block (spec §9 "Directory size of root").
        let root = RawInode::new(2, DIR_BIT | DEFAULT_DIR_MODE);
        self.write_inode(ROOT_INUM, &root);
    }

    pub(crate) fn image(&self) -> &Image {
        &self.image
    }

    pub(crate) fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    /// `alloc_page` (spec §4.C): linear scan from page 1 for the first clear bit.
    pub fn alloc_page(&mut self) -> FsResult<u32> {
        let page0 = self.image.page_mut(0);
        for i in 1..PAGE_COUNT {
            if !bitmap::get(page0, i) {
                bitmap::set(page0, i, true);
                trace!("alloc_page() -> {i}");
                return Ok(i as u32);
            }
        }
        trace!("alloc_page() -> exhausted ({PAGE_COUNT} pages all in use)");
        Err(FsError::NoSpace)
    }

    /// `free_page` (spec §4.C): clear bit `i`. Callers must not double-free.
    pub fn free_page(&mut self, pnum: u32) {
        trace!("free_page({pnum})");
        bitmap::set(self.image.page_mut(0), pnum as usize, false);
    }

    /// Number of pages not currently marked in use. Exposed for tests
    /// verifying P1/P3 and for the startup summary log (spec §10.3).
    pub fn free_page_count(&self) -> usize {
        let page0 = self.image.page(0);
        (0..PAGE_COUNT).filter(|&i| !bitmap::get(page0, i)).count()
    }

    /// Number of inode slots with `refs == 0`.
    pub fn free_inode_count(&self) -> usize {
        let count = crate::layout::inode_count() as u32;
        (0..count).filter(|&i| self.inode_raw(i).is_free()).count()
    }
}
