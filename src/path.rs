//! Path splitting (spec §4.F, §9 "Path strings").
//!
//! Normalized once: split on `/`, discard empty segments (this also absorbs
//! the leading empty segment produced by a rooted path and any trailing
//! slash), and treat the empty result as "root".

use crate::error::{FsError, FsResult};

/// Non-empty, `/`-separated path components, root-relative.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Splits `path` into its parent directory path and leaf name. Rejects the
/// root itself, since it has no leaf to operate on (spec §4.F, §4.G).
pub fn split_parent_leaf(path: &str) -> FsResult<(String, String)> {
    let mut comps: Vec<&str> = components(path).collect();
    let leaf = comps.pop().ok_or(FsError::InvalidArgument)?;
    let parent = format!("/{}", comps.join("/"));
    Ok((parent, leaf.to_string()))
}
