//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    files: HashMap<PathBuf, (UtcDateTime, Vec<u8>)>,
    /// Explicitly created directories; directories implied by a file path
    /// are derived from `files`.
    dirs: BTreeSet<PathBuf>,
}
impl State {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path) || self.files.keys().any(|file| file != path && file.starts_with(path))
    }

    fn has_children(&self, path: &Path) -> bool {
        self.files.keys().any(|file| file != path && file.starts_with(path))
            || self.dirs.iter().any(|dir| dir != path && dir.starts_with(path))
    }

    fn register_parents(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }
}

/// In-memory storage backend for testing.
///
/// Files and directories live behind a single [`RwLock`], so all trait
/// methods operate on `&self` without external synchronisation.
///
/// # Examples
///
/// ```
/// use tankobon_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("series_1/chapter_1.00/page_001.jpg", b"\xFF\xD8\xFF"),
/// ]);
/// assert!(backend.exists(Path::new("series_1/chapter_1.00")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    state: RwLock<State>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut state = State::default();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            state.register_parents(&validated);
            state.files.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            state: RwLock::new(state),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Snapshot of every stored file path, sorted. Handy for asserting the
    /// exact on-disk layout in tests.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.state.read().await.files.keys().cloned().collect();
        paths.sort();
        paths
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let entries: Vec<FileInfo> = {
                let guard = self.state.read().await;
                guard
                    .files
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, (inserted, data))| FileInfo::new(path.clone(), data.len() as u64, *inserted))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        let guard = self.state.read().await;
        Ok(guard.files.contains_key(&path) || guard.is_dir(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let guard = self.state.read().await;
        let (_inserted, data) = guard.files.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(data.clone())
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.state.write().await;
        guard.register_parents(&path);
        guard.files.insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.state.write().await;
        guard.files.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.state.write().await;
        if let Some(file) = guard.files.remove(&from) {
            guard.register_parents(&to);
            guard.files.insert(to, file);
            return Ok(());
        }
        if !guard.is_dir(&from) {
            exn::bail!(ErrorKind::NotFound(from));
        }
        if guard.has_children(&to) {
            exn::bail!(ErrorKind::AlreadyExists(to));
        }
        let moved: Vec<PathBuf> = guard.files.keys().filter(|file| file.starts_with(&from)).cloned().collect();
        for old in moved {
            if let (Ok(suffix), Some(entry)) = (old.strip_prefix(&from), guard.files.remove(&old)) {
                guard.files.insert(to.join(suffix), entry);
            }
        }
        let dirs: Vec<PathBuf> = guard.dirs.iter().filter(|dir| dir.starts_with(&from)).cloned().collect();
        for old in dirs {
            guard.dirs.remove(&old);
            if let Ok(suffix) = old.strip_prefix(&from) {
                guard.dirs.insert(to.join(suffix));
            }
        }
        guard.register_parents(&to);
        guard.dirs.insert(to);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.state.read().await;
        let (inserted, data) = guard.files.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileInfo::new(path.clone(), data.len() as u64, *inserted))
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.state.write().await;
        if guard.files.contains_key(&path) {
            exn::bail!(ErrorKind::AlreadyExists(path));
        }
        guard.register_parents(&path);
        guard.dirs.insert(path);
        Ok(())
    }

    async fn delete_dir(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.state.write().await;
        guard.files.retain(|file, _| !file.starts_with(&path));
        guard.dirs.retain(|dir| !dir.starts_with(&path));
        Ok(())
    }
}
