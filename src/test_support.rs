//! Test-only helper for building a throwaway, freshly formatted [`Filesystem`]
//! backed by a temporary image file (spec §10.4).

use crate::fs::Filesystem;
use tempfile::NamedTempFile;

/// Builds a `Filesystem` over a fresh temporary image, then removes the
/// image's directory entry. `Filesystem::open` has already mapped the file
/// by the time `path` drops, so the mapping stays valid (classic
/// unlink-while-mapped); this leaves no file behind under `/tmp` once the
/// test ends, one fresh temp path per call.
pub fn temp_fs() -> Filesystem {
    let file = NamedTempFile::new().expect("create temp image file");
    let path = file.into_temp_path();
    let fs = Filesystem::open(&path).expect("format temp image");
    drop(path);
    fs
}
