//! Read-only storage backend.
//!
//! Wraps another backend: reads pass through, every mutation is rejected.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{BackendHandle, FileInfo, StorageBackend};
use async_trait::async_trait;
use std::path::Path;

/// Read-only storage backend.
///
/// Wraps another backend and fails all write operations with
/// [`ReadOnly`](crate::error::ErrorKind::ReadOnly), logging a
/// [`warn event`](tracing::Event) for each rejected call.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }

    fn reject<T>(&self, operation: &str, path: &Path) -> Result<T> {
        tracing::warn!(backend = self.inner.name(), operation, path = %path.display(), "Rejecting mutation on read-only storage");
        exn::bail!(ErrorKind::ReadOnly(path.to_path_buf()))
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, _data: &[u8]) -> Result<()> {
        self.reject("write", path)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.reject("delete", path)
    }

    async fn rename(&self, from: &Path, _to: &Path) -> Result<()> {
        self.reject("rename", from)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        self.reject("create_dir", path)
    }

    async fn delete_dir(&self, path: &Path) -> Result<()> {
        self.reject("delete_dir", path)
    }
}
