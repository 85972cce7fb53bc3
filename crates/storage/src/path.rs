//! Path validation for storage-relative paths.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Validates a storage path and returns it normalized.
///
/// Paths must stay inside the storage root: `..` may only climb back out of a
/// component it previously entered. NUL bytes, Windows prefixes and paths
/// that normalize to nothing are rejected with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tankobon_storage::validate_path;
///
/// assert!(validate_path("series_1/chapter_1.00/page_001.jpg").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert_eq!(
///     validate_path("series_1/./chapter_2.00//page_001.png/").unwrap(),
///     Path::new("series_1/chapter_2.00/page_001.png")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // NUL passes through Path::components() on Unix but truncates in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}
