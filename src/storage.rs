//! Byte-range I/O across multiple blocks (spec §4.F).

use crate::error::{FsError, FsResult};
use crate::fs::Filesystem;
use crate::layout::PAGE_SIZE;

impl Filesystem {
    /// `storage_read` (spec §4.F): clamp to the file's logical size, then
    /// walk blocks `[start_block, end_block]`, copying the intra-block
    /// portion of each into `buf`. Returns the number of bytes copied.
    pub fn read_at(&self, inum: u32, buf: &mut [u8], offset: i64) -> FsResult<usize> {
        if offset < 0 {
            return Err(FsError::InvalidArgument);
        }
        let node = self.inode(inum)?;
        let offset = offset as usize;
        let file_size = node.size.max(0) as usize;
        if offset >= file_size {
            return Ok(0);
        }
        let size = buf.len().min(file_size - offset);
        if size == 0 {
            return Ok(0);
        }

        let start_block = offset / PAGE_SIZE;
        let end_block = (offset + size - 1) / PAGE_SIZE;
        let mut copied = 0;
        for block in start_block..=end_block {
            let page = self
                .block_page(&node, block)
                .expect("block index within file size must map to an attached page");
            let block_start = block * PAGE_SIZE;
            let intra_start = if block == start_block { offset - block_start } else { 0 };
            let intra_end = if block == end_block {
                offset + size - block_start
            } else {
                PAGE_SIZE
            };
            let chunk = intra_end - intra_start;
            buf[copied..copied + chunk].copy_from_slice(&self.image().page(page)[intra_start..intra_end]);
            copied += chunk;
        }
        Ok(copied)
    }

    /// `storage_write` (spec §4.F): first grows the file to cover
    /// `offset + buf.len()` (reusing `grow_inode`'s built-in reroute to
    /// shrink, per `storage_truncate`), then walks blocks the same way as
    /// [`Filesystem::read_at`] in the write direction.
    pub fn write_at(&mut self, inum: u32, buf: &[u8], offset: i64) -> FsResult<usize> {
        if offset < 0 {
            return Err(FsError::InvalidArgument);
        }
        let offset_usize = offset as usize;
        self.truncate(inum, (offset_usize + buf.len()) as i64)?;

        let node = self.inode(inum)?;
        let file_size = node.size.max(0) as usize;
        let size = buf.len().min(file_size.saturating_sub(offset_usize));
        if size == 0 {
            return Ok(0);
        }

        let start_block = offset_usize / PAGE_SIZE;
        let end_block = (offset_usize + size - 1) / PAGE_SIZE;
        let mut copied = 0;
        for block in start_block..=end_block {
            let page = self
                .block_page(&node, block)
                .expect("block index within file size must map to an attached page");
            let block_start = block * PAGE_SIZE;
            let intra_start = if block == start_block {
                offset_usize - block_start
            } else {
                0
            };
            let intra_end = if block == end_block {
                offset_usize + size - block_start
            } else {
                PAGE_SIZE
            };
            let chunk = intra_end - intra_start;
            self.image_mut().page_mut(page)[intra_start..intra_end]
                .copy_from_slice(&buf[copied..copied + chunk]);
            copied += chunk;
        }
        Ok(copied)
    }

    /// `storage_truncate` (spec §4.F): resolve to `grow_inode`, which
    /// reroutes to shrink when `size` is smaller than the current size.
    pub fn truncate(&mut self, inum: u32, size: i64) -> FsResult<()> {
        self.grow_inode(inum, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::FILE_BIT;
    use crate::test_support::temp_fs;

    fn make_file(fs: &mut Filesystem) -> u32 {
        let inum = fs.alloc_inode().unwrap();
        fs.write_inode(inum, &crate::inode::RawInode::new(1, FILE_BIT | 0o644));
        inum
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut fs = temp_fs();
        let inum = make_file(&mut fs);
        fs.write_at(inum, b"hello", 0).unwrap();
        let mut out = [0u8; 5];
        let n = fs.read_at(inum, &mut out, 0).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn write_crosses_block_boundary() {
        let mut fs = temp_fs();
        let inum = make_file(&mut fs);
        let data = vec![0xABu8; 9000];
        fs.write_at(inum, &data, 0).unwrap();
        let node = fs.inode(inum).unwrap();
        assert_eq!(node.size, 9000);
        assert_eq!(node.blocks(), 3);
        let mut out = vec![0u8; 9000];
        let n = fs.read_at(inum, &mut out, 0).unwrap();
        assert_eq!(n, 9000);
        assert!(out.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn write_at_offset_crossing_single_boundary() {
        let mut fs = temp_fs();
        let inum = make_file(&mut fs);
        fs.write_at(inum, &[0u8; PAGE_SIZE], 0).unwrap();
        fs.write_at(inum, &[1, 2], (PAGE_SIZE - 1) as i64).unwrap();
        let mut out = [0u8; 2];
        fs.read_at(inum, &mut out, (PAGE_SIZE - 1) as i64).unwrap();
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn read_past_end_of_file_returns_zero() {
        let mut fs = temp_fs();
        let inum = make_file(&mut fs);
        fs.write_at(inum, b"hi", 0).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(fs.read_at(inum, &mut out, 10).unwrap(), 0);
    }

    #[test]
    fn truncate_to_zero_frees_all_pages() {
        let mut fs = temp_fs();
        let inum = make_file(&mut fs);
        fs.write_at(inum, &[0u8; 9000], 0).unwrap();
        let free_before = fs.free_page_count();
        fs.truncate(inum, 0).unwrap();
        let node = fs.inode(inum).unwrap();
        assert_eq!(node.size, 0);
        assert_eq!(fs.free_page_count(), free_before + 4);
    }
}
