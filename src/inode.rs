//! Inode table and block-addressing scheme (spec §3, §4.D).
//!
//! Every access copies a [`RawInode`] out of (or into) the mapped image by
//! value rather than handing back a borrow into it: the image is one
//! contiguous buffer and the bitmap, inode table and data pages all alias
//! it, so holding a long-lived reference into one region while mutating
//! another (e.g. allocating a page while resizing an inode) would fight the
//! borrow checker for no real benefit. Pages are addressed by index, never
//! by pointer (spec §9 "Cycles and aliasing").

use crate::error::{FsError, FsResult};
use crate::fs::Filesystem;
use crate::layout::{inode_count, FIRST_ALLOCATABLE_INUM, INDIRECT_SLOTS, INODE_TABLE_OFFSET, PAGE_SIZE};
use log::trace;
use std::mem::size_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Type bit for a directory, matching `S_IFDIR`.
pub const DIR_BIT: u32 = libc::S_IFDIR as u32;
/// Type bit for a regular file, matching `S_IFREG`.
pub const FILE_BIT: u32 = libc::S_IFREG as u32;
/// Type bits for a symbolic link, matching `S_IFLNK`.
pub const SYMLINK_BIT: u32 = libc::S_IFLNK as u32;
/// Mask isolating the type bits of a mode word.
pub const TYPE_MASK: u32 = libc::S_IFMT as u32;

/// The on-disk inode record (spec §3). `ptrs`/`iptr` use `-1` as "unassigned".
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawInode {
    pub refs: u8,
    _pad: [u8; 3],
    pub mode: u32,
    pub size: i64,
    pub ptrs: [i32; 2],
    pub iptr: i32,
    pub acc: i64,
    pub modified: i64,
}

impl RawInode {
    /// A zeroed, free inode record (spec §3 lifecycle: `refs == 0 && mode == 0`).
    pub const fn zeroed() -> Self {
        Self {
            refs: 0,
            _pad: [0; 3],
            mode: 0,
            size: 0,
            ptrs: [-1, -1],
            iptr: -1,
            acc: 0,
            modified: 0,
        }
    }

    /// A fresh record with the given link count and mode, zero size and all
    /// pointers unassigned.
    pub fn new(refs: u8, mode: u32) -> Self {
        Self {
            refs,
            mode,
            ..Self::zeroed()
        }
    }

    pub fn is_free(&self) -> bool {
        self.refs == 0
    }

    pub fn is_dir(&self) -> bool {
        self.mode & TYPE_MASK == DIR_BIT
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & TYPE_MASK == SYMLINK_BIT
    }

    pub fn blocks(&self) -> u64 {
        blocks_for_size(self.size.max(0) as usize) as u64
    }
}

/// `⌈size / PAGE_SIZE⌉`, with `size == 0` mapping to 0 blocks (spec §3 invariant 2).
pub fn blocks_for_size(size: usize) -> usize {
    if size == 0 {
        0
    } else {
        (size + PAGE_SIZE - 1) / PAGE_SIZE
    }
}

impl Filesystem {
    /// Bounds- and liveness-checked inode read. `inum >= INODE_COUNT` or a
    /// free slot both surface as [`FsError::NotFound`] (spec §4.D, §7 "Bounds").
    pub fn inode(&self, inum: u32) -> FsResult<RawInode> {
        if inum as usize >= inode_count() {
            return Err(FsError::NotFound);
        }
        let node = self.inode_raw(inum);
        if node.is_free() {
            return Err(FsError::NotFound);
        }
        Ok(node)
    }

    /// Reads the raw slot without a liveness check; used by allocation to
    /// scan for free slots.
    pub(crate) fn inode_raw(&self, inum: u32) -> RawInode {
        let off = Self::inode_offset(inum);
        RawInode::read_from_bytes(&self.image().as_bytes()[off..off + size_of::<RawInode>()])
            .expect("inode record is a fixed-size POD type")
    }

    pub(crate) fn write_inode(&mut self, inum: u32, node: &RawInode) {
        let off = Self::inode_offset(inum);
        self.image_mut().as_bytes_mut()[off..off + size_of::<RawInode>()]
            .copy_from_slice(node.as_bytes());
    }

    fn inode_offset(inum: u32) -> usize {
        INODE_TABLE_OFFSET + inum as usize * size_of::<RawInode>()
    }

    /// `alloc_inode` (spec §4.D): first free slot from index 2 onward.
    pub fn alloc_inode(&mut self) -> FsResult<u32> {
        for inum in FIRST_ALLOCATABLE_INUM..inode_count() as u32 {
            if self.inode_raw(inum).is_free() {
                self.write_inode(inum, &RawInode::zeroed());
                return Ok(inum);
            }
        }
        Err(FsError::NoInodes)
    }

    /// `free_inode` (spec §4.D): release all data pages, then zero the record.
    pub fn free_inode(&mut self, inum: u32) {
        let node = self.inode_raw(inum);
        for slot in 0..blocks_for_size(node.size.max(0) as usize) {
            if let Some(p) = self.block_page(&node, slot) {
                self.free_page(p);
            }
        }
        if node.iptr >= 0 {
            self.free_page(node.iptr as u32);
        }
        self.write_inode(inum, &RawInode::zeroed());
    }

    /// Maps block index `slot` of `node` to a page number, following the
    /// indirect table if `slot >= 2` (spec §3 "Addressable capacity").
    pub fn block_page(&self, node: &RawInode, slot: usize) -> Option<u32> {
        match slot {
            0 => (node.ptrs[0] >= 0).then_some(node.ptrs[0] as u32),
            1 => (node.ptrs[1] >= 0).then_some(node.ptrs[1] as u32),
            k => {
                if node.iptr < 0 {
                    return None;
                }
                let offset = k - 2;
                if offset >= INDIRECT_SLOTS {
                    return None;
                }
                let v = self.read_indirect_slot(node.iptr as u32, offset);
                (v >= 0).then_some(v as u32)
            }
        }
    }

    fn read_indirect_slot(&self, iptr_page: u32, slot: usize) -> i32 {
        let bytes = &self.image().page(iptr_page)[slot * 4..slot * 4 + 4];
        i32::from_ne_bytes(bytes.try_into().unwrap())
    }

    fn write_indirect_slot(&mut self, iptr_page: u32, slot: usize, value: i32) {
        let bytes = &mut self.image_mut().page_mut(iptr_page)[slot * 4..slot * 4 + 4];
        bytes.copy_from_slice(&value.to_ne_bytes());
    }

    fn attach_block(&mut self, node: &mut RawInode, slot: usize, page: u32) {
        match slot {
            0 => node.ptrs[0] = page as i32,
            1 => node.ptrs[1] = page as i32,
            k => self.write_indirect_slot(node.iptr as u32, k - 2, page as i32),
        }
    }

    fn detach_block(&mut self, node: &mut RawInode, slot: usize) -> Option<u32> {
        match slot {
            0 => {
                let p = node.ptrs[0];
                node.ptrs[0] = -1;
                (p >= 0).then_some(p as u32)
            }
            1 => {
                let p = node.ptrs[1];
                node.ptrs[1] = -1;
                (p >= 0).then_some(p as u32)
            }
            k => {
                if node.iptr < 0 {
                    return None;
                }
                let offset = k - 2;
                let p = self.read_indirect_slot(node.iptr as u32, offset);
                self.write_indirect_slot(node.iptr as u32, offset, -1);
                (p >= 0).then_some(p as u32)
            }
        }
    }

    /// `grow_inode`/`shrink_inode` (spec §4.D). A negative `new_size` is
    /// rejected; a smaller `new_size` reroutes to [`Filesystem::shrink_inode`].
    /// On allocator exhaustion partway through growth, every page attached
    /// during this call is rolled back, leaving the inode exactly as it was
    /// (spec §9 "Allocation rollback on grow failure", option (b)).
    pub fn grow_inode(&mut self, inum: u32, new_size: i64) -> FsResult<()> {
        if new_size < 0 {
            return Err(FsError::InvalidArgument);
        }
        let mut node = self.inode_raw(inum);
        if (new_size as u64) < node.size.max(0) as u64 {
            return self.shrink_inode(inum, new_size);
        }

        let needed = blocks_for_size(new_size as usize);
        let have_original = blocks_for_size(node.size.max(0) as usize);
        let mut have = have_original;
        let mut attached_pages = Vec::new();
        let mut attached_iptr = false;
        let mut failure = None;

        while have < needed {
            if have == 2 && node.iptr < 0 {
                match self.alloc_page() {
                    Ok(p) => {
                        self.image_mut().page_mut(p).fill(0);
                        node.iptr = p as i32;
                        attached_pages.push(p);
                        attached_iptr = true;
                        trace!("grow_inode({inum}): attached indirect table at page {p}");
                    }
                    Err(e) => {
                        trace!("grow_inode({inum}): allocator exhausted attaching indirect table");
                        failure = Some(e);
                        break;
                    }
                }
            }
            match self.alloc_page() {
                Ok(p) => {
                    self.attach_block(&mut node, have, p);
                    attached_pages.push(p);
                    trace!("grow_inode({inum}): attached block {have} -> page {p}");
                    have += 1;
                }
                Err(e) => {
                    trace!("grow_inode({inum}): allocator exhausted attaching block {have}");
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            trace!(
                "grow_inode({inum}): rolling back {} attached page(s) after allocator exhaustion",
                attached_pages.len()
            );
            for slot in (have_original..have).rev() {
                self.detach_block(&mut node, slot);
            }
            if attached_iptr {
                node.iptr = -1;
            }
            for p in attached_pages {
                self.free_page(p);
            }
            return Err(e);
        }

        node.size = new_size;
        self.write_inode(inum, &node);
        Ok(())
    }

    /// See [`Filesystem::grow_inode`].
    pub fn shrink_inode(&mut self, inum: u32, new_size: i64) -> FsResult<()> {
        if new_size < 0 {
            return Err(FsError::InvalidArgument);
        }
        let mut node = self.inode_raw(inum);
        if (new_size as u64) > node.size.max(0) as u64 {
            return self.grow_inode(inum, new_size);
        }

        let needed = blocks_for_size(new_size as usize);
        let mut have = blocks_for_size(node.size.max(0) as usize);
        while have > needed {
            have -= 1;
            if let Some(p) = self.detach_block(&mut node, have) {
                trace!("shrink_inode({inum}): detached block {have} (page {p})");
                self.free_page(p);
            }
            if have <= 2 && node.iptr >= 0 {
                trace!("shrink_inode({inum}): detached indirect table at page {}", node.iptr);
                self.free_page(node.iptr as u32);
                node.iptr = -1;
            }
        }
        node.size = new_size;
        self.write_inode(inum, &node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_fs;

    #[test]
    fn grow_allocates_direct_blocks() {
        let mut fs = temp_fs();
        let inum = fs.alloc_inode().unwrap();
        fs.grow_inode(inum, PAGE_SIZE as i64).unwrap();
        let node = fs.inode(inum).unwrap();
        assert_eq!(node.blocks(), 1);
        assert!(node.ptrs[0] >= 0);
        assert_eq!(node.ptrs[1], -1);
        assert_eq!(node.iptr, -1);
    }

    #[test]
    fn grow_past_two_blocks_allocates_indirect() {
        let mut fs = temp_fs();
        let inum = fs.alloc_inode().unwrap();
        fs.grow_inode(inum, 3 * PAGE_SIZE as i64).unwrap();
        let node = fs.inode(inum).unwrap();
        assert_eq!(node.blocks(), 3);
        assert!(node.iptr >= 0);
        assert!(fs.block_page(&node, 2).is_some());
    }

    #[test]
    fn shrink_frees_indirect_when_crossing_boundary() {
        let mut fs = temp_fs();
        let inum = fs.alloc_inode().unwrap();
        fs.grow_inode(inum, 3 * PAGE_SIZE as i64).unwrap();
        fs.shrink_inode(inum, PAGE_SIZE as i64).unwrap();
        let node = fs.inode(inum).unwrap();
        assert_eq!(node.blocks(), 1);
        assert_eq!(node.iptr, -1);
    }

    #[test]
    fn shrink_to_zero_clears_pointers() {
        let mut fs = temp_fs();
        let inum = fs.alloc_inode().unwrap();
        fs.grow_inode(inum, PAGE_SIZE as i64).unwrap();
        fs.shrink_inode(inum, 0).unwrap();
        let node = fs.inode(inum).unwrap();
        assert_eq!(node.size, 0);
        assert_eq!(node.ptrs, [-1, -1]);
    }

    #[test]
    fn grow_rolls_back_attached_pages_on_allocator_exhaustion() {
        let mut fs = temp_fs();
        let inum = fs.alloc_inode().unwrap();

        // Exhaust the allocator, then give back exactly two pages: enough for
        // `grow_inode` to attach both direct blocks before it fails trying to
        // attach the indirect table for the third.
        let mut held = Vec::new();
        while let Ok(p) = fs.alloc_page() {
            held.push(p);
        }
        fs.free_page(held.pop().unwrap());
        fs.free_page(held.pop().unwrap());

        let free_before = fs.free_page_count();
        assert_eq!(free_before, 2);

        let err = fs.grow_inode(inum, 3 * PAGE_SIZE as i64).unwrap_err();
        assert_eq!(err, FsError::NoSpace);

        // P1: the failed grow must not leak pages...
        assert_eq!(fs.free_page_count(), free_before);
        // ...and must leave the inode exactly as it was before the call.
        let node = fs.inode(inum).unwrap();
        assert_eq!(node.size, 0);
        assert_eq!(node.ptrs, [-1, -1]);
        assert_eq!(node.iptr, -1);
    }

    #[test]
    fn free_inode_returns_pages_to_pool() {
        let mut fs = temp_fs();
        let inum = fs.alloc_inode().unwrap();
        fs.grow_inode(inum, 3 * PAGE_SIZE as i64).unwrap();
        let free_before = fs.free_page_count();
        fs.free_inode(inum);
        assert_eq!(fs.free_page_count(), free_before + 4); // 2 direct + 1 more + indirect table
    }
}
