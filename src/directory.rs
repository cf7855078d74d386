//! Directory subsystem: lookup, insertion, and compacting deletion (spec §4.E).

use crate::dirent::RawDirent;
use crate::error::{FsError, FsResult};
use crate::fs::Filesystem;
use crate::inode::RawInode;
use crate::layout::{PAGE_SIZE, ROOT_INUM};
use crate::path;
use std::mem::size_of;
use zerocopy::{FromBytes, IntoBytes};

fn entries_per_block() -> usize {
    PAGE_SIZE / size_of::<RawDirent>()
}

impl Filesystem {
    pub fn dirent_count(&self, dir: &RawInode) -> usize {
        dir.size.max(0) as usize / size_of::<RawDirent>()
    }

    /// Reads entry `idx` of `dir`. Addressing follows the same direct/direct/
    /// indirect slot scheme as file blocks (spec §4.E).
    fn read_dirent(&self, dir: &RawInode, idx: usize) -> RawDirent {
        let per_block = entries_per_block();
        let block = self
            .block_page(dir, idx / per_block)
            .expect("dirent index within dir.size must map to an attached block");
        let offset = (idx % per_block) * size_of::<RawDirent>();
        RawDirent::read_from_bytes(&self.image().page(block)[offset..offset + size_of::<RawDirent>()])
            .expect("dirent record is a fixed-size POD type")
    }

    fn write_dirent(&mut self, dir: &RawInode, idx: usize, entry: &RawDirent) {
        let per_block = entries_per_block();
        let block = self
            .block_page(dir, idx / per_block)
            .expect("dirent index within dir.size must map to an attached block");
        let offset = (idx % per_block) * size_of::<RawDirent>();
        self.image_mut().page_mut(block)[offset..offset + size_of::<RawDirent>()]
            .copy_from_slice(entry.as_bytes());
    }

    /// `directory_get`/`directory_lookup` (spec §4.E): linear scan for `name`.
    pub fn directory_get(&self, dir: &RawInode, name: &str) -> Option<(usize, RawDirent)> {
        (0..self.dirent_count(dir))
            .map(|i| (i, self.read_dirent(dir, i)))
            .find(|(_, e)| e.name() == name)
    }

    pub fn directory_lookup(&self, dir: &RawInode, name: &str) -> FsResult<u32> {
        self.directory_get(dir, name)
            .map(|(_, e)| e.inum())
            .ok_or(FsError::NotFound)
    }

    /// `tree_lookup` (spec §4.E): walk `path` one component per directory,
    /// starting from the root.
    pub fn tree_lookup(&self, path: &str) -> FsResult<u32> {
        let mut inum = ROOT_INUM;
        for component in path::components(path) {
            let node = self.inode(inum)?;
            if !node.is_dir() {
                return Err(FsError::NotADirectory);
            }
            inum = self.directory_lookup(&node, component)?;
        }
        Ok(inum)
    }

    /// `directory_put` (spec §4.E): grow `dir_inum` by one entry and write
    /// `(name, inum)` into the newly created tail slot.
    pub fn directory_put(&mut self, dir_inum: u32, name: &str, inum: u32) -> FsResult<()> {
        let entry = RawDirent::new(name, inum)?;
        let dir = self.inode(dir_inum)?;
        let tail = self.dirent_count(&dir);
        self.grow_inode(dir_inum, dir.size + size_of::<RawDirent>() as i64)?;
        let dir = self.inode(dir_inum)?;
        self.write_dirent(&dir, tail, &entry);
        Ok(())
    }

    /// `directory_delete` (spec §4.E): remove the entry for `name`, shifting
    /// every later entry back by one slot — the block-walking compaction
    /// expressed index-wise, so the direct→direct, direct→indirect and
    /// indirect→indirect transitions are all handled by the same loop rather
    /// than needing separate per-boundary cases (spec §9 "Directory
    /// compaction"). Returns the removed inum; freeing that inode is the
    /// caller's decision (spec §4.G, §9 "Rename correctness").
    pub fn directory_delete(&mut self, dir_inum: u32, name: &str) -> FsResult<u32> {
        let dir = self.inode(dir_inum)?;
        let count = self.dirent_count(&dir);
        let (removed_idx, removed) = self.directory_get(&dir, name).ok_or(FsError::NotFound)?;

        for i in removed_idx..count - 1 {
            let next = self.read_dirent(&dir, i + 1);
            self.write_dirent(&dir, i, &next);
        }
        self.write_dirent(&dir, count - 1, &RawDirent::empty());
        self.shrink_inode(dir_inum, dir.size - size_of::<RawDirent>() as i64)?;
        Ok(removed.inum())
    }

    /// `directory_list` (spec §4.E): every entry's name, in order.
    pub fn directory_list(&self, dir: &RawInode) -> Vec<String> {
        (0..self.dirent_count(dir))
            .map(|i| self.read_dirent(dir, i).name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::{DIR_BIT, FILE_BIT};
    use crate::test_support::temp_fs;

    fn make_dir(fs: &mut Filesystem) -> u32 {
        let inum = fs.alloc_inode().unwrap();
        let node = RawInode::new(2, DIR_BIT | 0o755);
        fs.write_inode(inum, &node);
        inum
    }

    fn make_file(fs: &mut Filesystem) -> u32 {
        let inum = fs.alloc_inode().unwrap();
        let node = RawInode::new(1, FILE_BIT | 0o644);
        fs.write_inode(inum, &node);
        inum
    }

    #[test]
    fn put_then_lookup_round_trips() {
        let mut fs = temp_fs();
        let dir = make_dir(&mut fs);
        let file = make_file(&mut fs);
        fs.directory_put(dir, "a", file).unwrap();
        let node = fs.inode(dir).unwrap();
        assert_eq!(fs.directory_lookup(&node, "a").unwrap(), file);
        assert_eq!(fs.directory_lookup(&node, "missing").unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn delete_compacts_across_multiple_blocks() {
        let mut fs = temp_fs();
        let dir = make_dir(&mut fs);
        let per_block = entries_per_block();
        let names: Vec<String> = (0..per_block + 5).map(|i| format!("f{i}")).collect();
        for name in &names {
            let file = make_file(&mut fs);
            fs.directory_put(dir, name, file).unwrap();
        }
        // Delete the first entry: everything after it, including entries
        // that live in the second block, must shift back by one.
        fs.directory_delete(dir, &names[0]).unwrap();
        let node = fs.inode(dir).unwrap();
        let remaining = fs.directory_list(&node);
        assert_eq!(remaining.len(), names.len() - 1);
        assert_eq!(remaining, names[1..]);
        for name in &names[1..] {
            assert!(fs.directory_lookup(&node, name).is_ok());
        }
    }

    #[test]
    fn delete_compacts_across_direct_to_indirect_boundary() {
        let mut fs = temp_fs();
        let dir = make_dir(&mut fs);
        let per_block = entries_per_block();
        // Two full direct blocks plus a few entries into the indirect block,
        // so compaction must shift entries across both the direct->direct
        // and direct->indirect/indirect->indirect boundaries (spec §9
        // "Directory compaction", property B4).
        let names: Vec<String> = (0..2 * per_block + 5).map(|i| format!("f{i}")).collect();
        for name in &names {
            let file = make_file(&mut fs);
            fs.directory_put(dir, name, file).unwrap();
        }
        let node = fs.inode(dir).unwrap();
        assert!(node.iptr >= 0, "test setup should have forced an indirect block");

        // Delete the first entry: every later entry, including the ones
        // that now live past the two direct blocks, must shift back by one.
        fs.directory_delete(dir, &names[0]).unwrap();
        let node = fs.inode(dir).unwrap();
        let remaining = fs.directory_list(&node);
        assert_eq!(remaining.len(), names.len() - 1);
        assert_eq!(remaining, names[1..]);
        for name in &names[1..] {
            assert!(fs.directory_lookup(&node, name).is_ok());
        }
    }

    #[test]
    fn delete_rejects_missing_name() {
        let mut fs = temp_fs();
        let dir = make_dir(&mut fs);
        assert_eq!(fs.directory_delete(dir, "nope").unwrap_err(), FsError::NotFound);
    }
}
