//! A userspace filesystem backed by a single fixed-size memory-mapped disk
//! image (see `SPEC_FULL.md` at the repository root for the full design).
//!
//! The [`fs::Filesystem`] type is the single value threaded through every
//! operation; there is no ambient global state. [`ops`] implements the
//! filesystem-facing surface ([`fs::Filesystem::stat`], `mknod`, `read`,
//! `write`, ...) that a kernel-bridge adapter would call.

pub mod bitmap;
pub mod dirent;
pub mod directory;
pub mod error;
pub mod fs;
pub mod image;
pub mod inode;
pub mod layout;
pub mod ops;
pub mod path;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use error::{FsError, FsResult, ImageError};
pub use fs::Filesystem;
pub use ops::Stat;
