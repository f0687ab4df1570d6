//! Path validation.
//!
//! Container names arrive from index lines and collection names arrive from
//! request paths, so neither can be trusted to stay inside the collections
//! root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path and returns it normalized.
///
/// `..` may only cancel a preceding component; it can never climb above the
/// root. Null bytes are rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use rewind_storage::validate_path;
/// assert!(validate_path("my-coll/archive/example.warc.gz").is_ok());
/// assert!(validate_path("my-coll/../other/archive/a.warc.gz").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("my-coll/../../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("/my-coll//./archive/x/../a.warc.gz").unwrap(),
///     Path::new("my-coll/archive/a.warc.gz")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            // Null bytes pass through Path::components() on Unix but truncate
            // C-based syscalls.
            Component::Normal(s) if s.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(s) => components.push(s),
            // Index lines written on another host may carry absolute names;
            // they are always re-rooted.
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(components.into_iter().collect()),
    }
}
