//! The fixed-size directory entry record (spec §3 "Directory entry").

use crate::error::{FsError, FsResult};
use crate::layout::DIRENT_NAME_LEN;
use log::warn;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A `(name, inum)` record. `inum < 0` marks a vacated slot.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawDirent {
    name: [u8; DIRENT_NAME_LEN],
    inum: i32,
}

impl RawDirent {
    /// Builds an entry for `name`, rejecting names whose null-terminated
    /// encoding would not fit in [`DIRENT_NAME_LEN`] bytes.
    pub fn new(name: &str, inum: u32) -> FsResult<Self> {
        let bytes = name.as_bytes();
        if bytes.len() + 1 > DIRENT_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        let mut buf = [0u8; DIRENT_NAME_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            name: buf,
            inum: inum as i32,
        })
    }

    /// A zeroed, vacated slot.
    pub fn empty() -> Self {
        Self {
            name: [0; DIRENT_NAME_LEN],
            inum: -1,
        }
    }

    pub fn inum(&self) -> u32 {
        self.inum as u32
    }

    /// Decodes the name. A name that isn't valid UTF-8 should never land on
    /// disk through [`RawDirent::new`], so encountering one here means the
    /// image was written by something else (or corrupted); that's logged at
    /// `warn` and the lossy decoding is returned rather than panicking.
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        let raw = &self.name[..len];
        match std::str::from_utf8(raw) {
            Ok(s) => s,
            Err(_) => {
                warn!("dirent name is not valid UTF-8: {:?}", String::from_utf8_lossy(raw));
                ""
            }
        }
    }
}
