//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a unified interface for
//! file and directory operations relative to a storage root, along with the
//! local filesystem backend, the read-only decorator and (behind the `mock`
//! feature) an in-memory backend for tests.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// All operations are asynchronous. Paths are relative to the storage root
/// and must be validated using [`validate_path`](crate::validate_path)
/// before use; implementations enforce this.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tankobon_storage::{backend::StorageBackend, error::Result};
///
/// async fn page_size(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("series_1/chapter_1.00/page_001.jpg");
///     match backend.exists(path).await? {
///         true => Ok(backend.stat(path).await?.size),
///         false => Ok(0),
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream metadata for every file (not directory) whose path starts with
    /// `prefix`, component-wise.
    ///
    /// Listing a prefix that doesn't exist yields an empty stream rather than
    /// an error.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file or directory exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents, creating parent directories as needed and
    /// overwriting any existing file.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename/move a file or a whole directory within the same backend.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// does not exist.
    ///
    /// # Notes
    /// - Parent directories of the destination are created as needed.
    /// - An existing destination file is overwritten; a non-empty destination
    ///   directory is an error.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Create a directory and all of its parents. Creating a directory that
    /// already exists succeeds.
    async fn create_dir(&self, path: &Path) -> Result<()>;

    /// Recursively delete a directory and everything below it. Deleting a
    /// directory that doesn't exist succeeds.
    async fn delete_dir(&self, path: &Path) -> Result<()>;
}
