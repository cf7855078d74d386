//! Filesystem-facing operations (spec §4.G).
//!
//! Each method here is what an adapter (out of scope, spec §1) would wire a
//! kernel callback to. Internally these return [`FsError`]; an adapter maps
//! that to a negative errno via [`FsError::to_errno`] at its own boundary.
//! Every call is logged at `debug` on entry and again with its result
//! (success or errno) on the way out (spec §10.1).

use crate::error::{FsError, FsResult};
use crate::fs::Filesystem;
use crate::inode::{RawInode, DIR_BIT, SYMLINK_BIT, TYPE_MASK};
use crate::path;
use log::debug;

/// Logs `debug!("{label} -> {result:?}")`, matching the source's
/// `printf("%s(...) -> %d\n", ...)` call after every operation.
macro_rules! log_result {
    ($label:expr, $result:expr) => {{
        let result = $result;
        match &result {
            Ok(v) => debug!("{} -> Ok({v:?})", $label),
            Err(e) => debug!("{} -> Err({e}) [{}]", $label, e.to_errno()),
        }
        result
    }};
}

/// What `stat` reports about an inode (spec §4.G).
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub mode: u32,
    pub size: i64,
    pub inum: u32,
    pub nlink: u8,
    pub blocks: u64,
    pub uid: u32,
}

impl Filesystem {
    pub fn stat(&self, path: &str) -> FsResult<Stat> {
        let label = format!("stat({path})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            let node = self.inode(inum)?;
            Ok(Stat {
                mode: node.mode,
                size: node.size,
                inum,
                nlink: node.refs,
                blocks: node.blocks(),
                uid: unsafe { libc::getuid() },
            })
        })())
    }

    /// `mknod` (spec §4.G): creates a fresh, empty inode of `mode` at `path`
    /// and inserts it into its parent directory.
    pub fn mknod(&mut self, path: &str, mode: u32) -> FsResult<u32> {
        let label = format!("mknod({path}, {mode:#o})");
        debug!("{label}");
        log_result!(label, (|| {
            let (parent_path, name) = path::split_parent_leaf(path)?;
            let parent_inum = self.tree_lookup(&parent_path)?;
            let parent = self.inode(parent_inum)?;
            if !parent.is_dir() {
                return Err(FsError::NotADirectory);
            }
            if self.directory_lookup(&parent, &name).is_ok() {
                return Err(FsError::AlreadyExists);
            }

            let inum = self.alloc_inode()?;
            let refs = if mode & TYPE_MASK == DIR_BIT { 2 } else { 1 };
            let node = RawInode::new(refs, mode);
            self.write_inode(inum, &node);

            if let Err(e) = self.directory_put(parent_inum, &name, inum) {
                self.free_inode(inum);
                return Err(e);
            }
            Ok(inum)
        })())
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<u32> {
        debug!("mkdir({path}, {mode:#o})");
        self.mknod(path, DIR_BIT | mode)
    }

    /// `unlink` (spec §4.G): removes the directory entry; frees the inode
    /// once its link count drops to zero.
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let label = format!("unlink({path})");
        debug!("{label}");
        log_result!(label, (|| {
            let (parent_path, name) = path::split_parent_leaf(path)?;
            let parent_inum = self.tree_lookup(&parent_path)?;
            let removed_inum = self.directory_delete(parent_inum, &name)?;
            let mut node = self.inode(removed_inum)?;
            node.refs = node.refs.saturating_sub(1);
            self.write_inode(removed_inum, &node);
            if node.refs == 0 {
                self.free_inode(removed_inum);
            }
            Ok(())
        })())
    }

    /// `link` (spec §4.G): adds another directory entry pointing at the same
    /// inode as `from`, bumping its link count.
    pub fn link(&mut self, from: &str, to: &str) -> FsResult<()> {
        let label = format!("link({from}, {to})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(from)?;
            let (parent_path, name) = path::split_parent_leaf(to)?;
            let parent_inum = self.tree_lookup(&parent_path)?;
            let parent = self.inode(parent_inum)?;
            if self.directory_lookup(&parent, &name).is_ok() {
                return Err(FsError::AlreadyExists);
            }
            self.directory_put(parent_inum, &name, inum)?;
            let mut node = self.inode(inum)?;
            node.refs += 1;
            self.write_inode(inum, &node);
            Ok(())
        })())
    }

    /// `symlink` (spec §4.G): creates a symlink inode whose content is the
    /// target path, including its null terminator.
    pub fn symlink(&mut self, target: &str, linkpath: &str) -> FsResult<()> {
        let label = format!("symlink({target}, {linkpath})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.mknod(linkpath, SYMLINK_BIT | 0o777)?;
            let mut content = target.as_bytes().to_vec();
            content.push(0);
            self.write_at(inum, &content, 0)?;
            Ok(())
        })())
    }

    /// `readlink` (spec §4.G): reads up to `max_len` bytes of the symlink's
    /// content. Fails with [`FsError::ResultTooLarge`] rather than silently
    /// truncating when the content doesn't fit `max_len`, matching the
    /// source's `rv != node->size` check in `nufs_readlink`.
    pub fn readlink(&self, path: &str, max_len: usize) -> FsResult<String> {
        let label = format!("readlink({path}, max_len={max_len})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            let node = self.inode(inum)?;
            if !node.is_symlink() {
                return Err(FsError::InvalidArgument);
            }
            let size = node.size.max(0) as usize;
            if size > max_len {
                return Err(FsError::ResultTooLarge);
            }
            let mut buf = vec![0u8; size];
            let n = self.read_at(inum, &mut buf, 0)?;
            buf.truncate(n);
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
        })())
    }

    /// `rename` (spec §4.G, §9 "Rename correctness"): moves the entry from
    /// `from` to `to`, preserving the inode — `directory_delete` never frees
    /// it, only `unlink` does.
    pub fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        let label = format!("rename({from}, {to})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(from)?;
            let (from_parent_path, from_name) = path::split_parent_leaf(from)?;
            let (to_parent_path, to_name) = path::split_parent_leaf(to)?;
            let from_parent = self.tree_lookup(&from_parent_path)?;
            let to_parent = self.tree_lookup(&to_parent_path)?;

            if from_parent == to_parent && from_name == to_name {
                return Ok(());
            }
            let to_parent_node = self.inode(to_parent)?;
            if self.directory_lookup(&to_parent_node, &to_name).is_ok() {
                let overwritten = self.directory_delete(to_parent, &to_name)?;
                let mut node = self.inode(overwritten)?;
                node.refs = node.refs.saturating_sub(1);
                self.write_inode(overwritten, &node);
                if node.refs == 0 {
                    self.free_inode(overwritten);
                }
            }
            self.directory_delete(from_parent, &from_name)?;
            self.directory_put(to_parent, &to_name, inum)?;
            Ok(())
        })())
    }

    /// `chmod` (spec §4.G): overwrites the permission bits, keeping the type
    /// bits the stored mode already carries (see DESIGN.md — a literal full
    /// overwrite of `mode` would let a caller corrupt `is_dir`/`is_symlink`).
    pub fn chmod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let label = format!("chmod({path}, {mode:#o})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            let mut node = self.inode(inum)?;
            node.mode = (node.mode & TYPE_MASK) | (mode & !TYPE_MASK);
            self.write_inode(inum, &node);
            Ok(())
        })())
    }

    /// `utimens` (spec §4.G): sets access and modification timestamps, in
    /// whole seconds.
    pub fn utimens(&mut self, path: &str, atime: i64, mtime: i64) -> FsResult<()> {
        let label = format!("utimens({path}, {atime}, {mtime})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            let mut node = self.inode(inum)?;
            node.acc = atime;
            node.modified = mtime;
            self.write_inode(inum, &node);
            Ok(())
        })())
    }

    /// `readdir` (spec §4.G): `.` plus every entry, each with its stat.
    pub fn readdir(&self, path: &str) -> FsResult<Vec<(String, Stat)>> {
        let label = format!("readdir({path})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            let node = self.inode(inum)?;
            if !node.is_dir() {
                return Err(FsError::NotADirectory);
            }
            let mut out = vec![(
                ".".to_string(),
                Stat {
                    mode: node.mode,
                    size: node.size,
                    inum,
                    nlink: node.refs,
                    blocks: node.blocks(),
                    uid: unsafe { libc::getuid() },
                },
            )];
            for name in self.directory_list(&node) {
                let child_inum = self.directory_lookup(&node, &name)?;
                let child = self.inode(child_inum)?;
                out.push((
                    name,
                    Stat {
                        mode: child.mode,
                        size: child.size,
                        inum: child_inum,
                        nlink: child.refs,
                        blocks: child.blocks(),
                        uid: unsafe { libc::getuid() },
                    },
                ));
            }
            Ok(out)
        })())
    }

    /// `access` (spec §4.G, §9): always succeeds; permission enforcement is
    /// out of scope.
    pub fn access(&self, path: &str) -> FsResult<()> {
        let label = format!("access({path})");
        debug!("{label}");
        log_result!(label, self.tree_lookup(path).map(|_| ()))
    }

    pub fn read(&self, path: &str, buf: &mut [u8], offset: i64) -> FsResult<usize> {
        let label = format!("read({path}, len={}, offset={offset})", buf.len());
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            self.read_at(inum, buf, offset)
        })())
    }

    pub fn write(&mut self, path: &str, buf: &[u8], offset: i64) -> FsResult<usize> {
        let label = format!("write({path}, len={}, offset={offset})", buf.len());
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            self.write_at(inum, buf, offset)
        })())
    }

    pub fn truncate_path(&mut self, path: &str, size: i64) -> FsResult<()> {
        let label = format!("truncate({path}, {size})");
        debug!("{label}");
        log_result!(label, (|| {
            let inum = self.tree_lookup(path)?;
            self.truncate(inum, size)
        })())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::FILE_BIT;
    use crate::test_support::temp_fs;

    #[test]
    fn fresh_image_root_has_only_dot() {
        let fs = temp_fs();
        let entries = fs.readdir("/").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, ".");
    }

    #[test]
    fn mknod_write_read_stat_scenario() {
        let mut fs = temp_fs();
        fs.mknod("/a", FILE_BIT | 0o644).unwrap();
        fs.write("/a", b"hello", 0).unwrap();
        let mut buf = [0u8; 5];
        fs.read("/a", &mut buf, 0).unwrap();
        assert_eq!(&buf, b"hello");
        let st = fs.stat("/a").unwrap();
        assert_eq!(st.size, 5);
        assert_eq!(st.blocks, 1);
    }

    #[test]
    fn mkdir_mknod_readdir_scenario() {
        let mut fs = temp_fs();
        fs.mkdir("/d", 0o755).unwrap();
        fs.mknod("/d/f", FILE_BIT | 0o644).unwrap();
        let entries = fs.readdir("/d").unwrap();
        assert!(entries.iter().any(|(name, _)| name == "f"));
        assert!(fs.tree_lookup("/d/f").unwrap() > 0);
    }

    #[test]
    fn mknod_rejects_duplicate() {
        let mut fs = temp_fs();
        fs.mknod("/a", FILE_BIT | 0o644).unwrap();
        assert_eq!(fs.mknod("/a", FILE_BIT | 0o644).unwrap_err(), FsError::AlreadyExists);
    }

    #[test]
    fn mknod_rejects_missing_parent() {
        let mut fs = temp_fs();
        assert_eq!(
            fs.mknod("/missing/a", FILE_BIT | 0o644).unwrap_err(),
            FsError::NotFound
        );
    }

    #[test]
    fn link_shares_inode_and_unlink_preserves_other_name() {
        let mut fs = temp_fs();
        fs.mknod("/a", FILE_BIT | 0o644).unwrap();
        fs.link("/a", "/b").unwrap();
        let a = fs.stat("/a").unwrap();
        let b = fs.stat("/b").unwrap();
        assert_eq!(a.inum, b.inum);
        assert_eq!(a.nlink, 2);

        fs.unlink("/a").unwrap();
        let b = fs.stat("/b").unwrap();
        assert_eq!(b.nlink, 1);
        assert!(fs.stat("/a").is_err());

        fs.unlink("/b").unwrap();
        assert!(fs.stat("/b").is_err());
    }

    #[test]
    fn rename_preserves_inode_and_content() {
        let mut fs = temp_fs();
        fs.mknod("/a", FILE_BIT | 0o644).unwrap();
        fs.write("/a", b"payload", 0).unwrap();
        let before = fs.stat("/a").unwrap();
        fs.rename("/a", "/b").unwrap();
        let after = fs.stat("/b").unwrap();
        assert_eq!(before.inum, after.inum);
        assert!(fs.stat("/a").is_err());
        let mut buf = [0u8; 7];
        fs.read("/b", &mut buf, 0).unwrap();
        assert_eq!(&buf, b"payload");
    }

    #[test]
    fn symlink_readlink_round_trips() {
        let mut fs = temp_fs();
        fs.symlink("target", "/s").unwrap();
        let content = fs.readlink("/s", 16).unwrap();
        assert_eq!(content, "target");
    }

    #[test]
    fn readlink_rejects_buffer_too_small_for_content() {
        let mut fs = temp_fs();
        fs.symlink("target", "/s").unwrap();
        // "target\0" is 7 bytes; a 3-byte buffer can't hold it.
        assert_eq!(fs.readlink("/s", 3).unwrap_err(), FsError::ResultTooLarge);
        // A buffer exactly as large as the content still succeeds.
        assert_eq!(fs.readlink("/s", 7).unwrap(), "target");
    }

    #[test]
    fn truncate_to_zero_reports_zero_size() {
        let mut fs = temp_fs();
        fs.mknod("/a", FILE_BIT | 0o644).unwrap();
        fs.write("/a", b"hello", 0).unwrap();
        fs.truncate_path("/a", 0).unwrap();
        assert_eq!(fs.stat("/a").unwrap().size, 0);
    }
}
