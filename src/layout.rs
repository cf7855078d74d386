//! On-disk constants and the derived layout of the image (spec §3, §6).

use crate::inode::RawInode;

/// Number of pages in the image.
pub const PAGE_COUNT: usize = 256;
/// Size of a page/block in bytes.
pub const PAGE_SIZE: usize = 4096;
/// Total image size in bytes.
pub const NUFS_SIZE: usize = PAGE_COUNT * PAGE_SIZE;

/// Maximum length of a directory entry name, including the null terminator.
pub const DIRENT_NAME_LEN: usize = 48;

/// Inode number of the sentinel entry representing the bitmap/boot page.
pub const SENTINEL_INUM: u32 = 0;
/// Inode number of the root directory.
pub const ROOT_INUM: u32 = 1;
/// Inode allocation starts scanning from this index (0 and 1 are reserved).
pub const FIRST_ALLOCATABLE_INUM: u32 = 2;

/// Number of inodes that fit after the bitmap within page 0.
///
/// `(8 * PAGE_SIZE - PAGE_COUNT) / (8 * sizeof(inode))` (spec §3).
pub fn inode_count() -> usize {
    (8 * PAGE_SIZE - PAGE_COUNT) / (8 * std::mem::size_of::<RawInode>())
}

/// Byte offset of the inode table within the image: the bitmap is given a
/// full `PAGE_COUNT` bytes of headroom (one byte per page, far more than the
/// bits actually need) so the table's start offset is a fixed constant
/// (spec §3/§6).
pub const INODE_TABLE_OFFSET: usize = PAGE_COUNT;

/// Number of pages the bitmap + inode table actually occupy, rounded up.
/// With the constants in this module the table runs a little past the end
/// of page 0, so more than one page holds metadata; every one of them must
/// be reserved at format time so the allocator never hands it out as a data
/// page (spec §9 "Cycles and aliasing" — the bitmap is the sole authority
/// on liveness, so it must agree with where the metadata actually lives).
pub fn metadata_page_count() -> usize {
    (INODE_TABLE_OFFSET + inode_count() * std::mem::size_of::<RawInode>()).div_ceil(PAGE_SIZE)
}

/// Number of `i32` indirect page-number slots that fit in one page.
pub const INDIRECT_SLOTS: usize = PAGE_SIZE / std::mem::size_of::<i32>();

/// Maximum file size addressable with two direct blocks and one indirect page
/// of pointers (spec §3 "Addressable capacity").
pub fn max_file_size() -> usize {
    (2 + INDIRECT_SLOTS) * PAGE_SIZE
}
