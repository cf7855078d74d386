//! Error taxonomy for filesystem operations.
//!
//! Two domains exist: [`ImageError`] covers failures that occur before a
//! [`crate::fs::Filesystem`] exists (opening, truncating or mapping the backing
//! file), and [`FsError`] covers filesystem-semantic failures that every
//! operation in [`crate::ops`] maps to a negative POSIX errno.

use std::io;
use thiserror::Error;

/// Failure while acquiring the backing image. Fatal to the process; there is
/// no `Filesystem` yet to recover into.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to open image file: {0}")]
    Open(#[source] io::Error),
    #[error("failed to size image file to {expected} bytes: {source}")]
    Resize {
        expected: u64,
        #[source]
        source: io::Error,
    },
    #[error("failed to map image file: {0}")]
    Map(#[source] io::Error),
}

/// Filesystem-semantic error, named per the taxonomy of the operation
/// boundary. Each variant carries enough identity for a useful log line and
/// converts to the negative errno an adapter expects.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("file already exists")]
    AlreadyExists,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("name too long")]
    NameTooLong,
    #[error("result too large for caller's buffer")]
    ResultTooLarge,
    #[error("no space left on device")]
    NoSpace,
    #[error("no free inode")]
    NoInodes,
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// The negative POSIX errno this error maps to at the operation boundary (spec §7, §10.2).
    pub fn to_errno(self) -> i32 {
        match self {
            FsError::NotFound => -libc::ENOENT,
            FsError::AlreadyExists => -libc::EEXIST,
            FsError::InvalidArgument => -libc::EINVAL,
            FsError::NotADirectory => -libc::ENOTDIR,
            FsError::IsADirectory => -libc::EISDIR,
            FsError::NotEmpty => -libc::ENOTEMPTY,
            FsError::NameTooLong | FsError::ResultTooLarge => -libc::ENAMETOOLONG,
            FsError::NoSpace | FsError::NoInodes => -libc::ENOSPC,
        }
    }
}
