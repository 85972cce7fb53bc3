//! Page Store: deterministic page image layout on top of a storage backend.
//!
//! ```text
//! <root>/series_<id>/chapter_<number:.2>/page_<number:03>.<ext>
//! ```
//!
//! This layout is a contract: anything serving the images statically relies
//! on the exact naming scheme.

use crate::BackendHandle;
use crate::error::{ErrorKind, Result};
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use tankobon_models::{ChapterNumber, ImageFormat, MAX_PAGE_NUMBER, SeriesId};
use tracing::instrument;

/// Maps (series, chapter number, page number) to image files and performs
/// the physical file and directory operations.
#[derive(Clone)]
pub struct PageStore {
    backend: BackendHandle,
}

impl PageStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn series_directory(series_id: SeriesId) -> PathBuf {
        PathBuf::from(format!("series_{series_id}"))
    }

    pub fn chapter_directory(series_id: SeriesId, chapter: ChapterNumber) -> PathBuf {
        Self::series_directory(series_id).join(format!("chapter_{chapter}"))
    }

    /// Relative path of a page image.
    ///
    /// # Errors
    ///
    /// [`InvalidPath`](crate::error::ErrorKind::InvalidPath) if the page
    /// number doesn't fit the three-digit filename (`1..=999`).
    pub fn page_path(series_id: SeriesId, chapter: ChapterNumber, page: u32, format: ImageFormat) -> Result<PathBuf> {
        let stem = Self::page_stem(series_id, chapter, page)?;
        Ok(stem.with_extension(format.extension()))
    }

    /// Path of a page image without its extension. Two images with the same
    /// stem occupy the same page slot.
    pub fn page_stem(series_id: SeriesId, chapter: ChapterNumber, page: u32) -> Result<PathBuf> {
        if page == 0 || page > MAX_PAGE_NUMBER {
            exn::bail!(ErrorKind::InvalidPath(
                Self::chapter_directory(series_id, chapter).join(format!("page_{page:03}"))
            ));
        }
        Ok(Self::chapter_directory(series_id, chapter).join(format!("page_{page:03}")))
    }

    /// Find the stored image of a page regardless of its extension.
    pub async fn find_page_image(&self, series_id: SeriesId, chapter: ChapterNumber, page: u32) -> Result<Option<PathBuf>> {
        let stem = Self::page_stem(series_id, chapter, page)?;
        let directory = Self::chapter_directory(series_id, chapter);
        let mut files = self.backend.list_stream(Some(&directory));
        while let Some(info) = files.try_next().await? {
            if info.path.parent() == Some(directory.as_path()) && info.path.with_extension("") == stem {
                return Ok(Some(info.path));
            }
        }
        Ok(None)
    }

    /// Write a page image, creating parent directories as needed and
    /// overwriting any existing file at that path.
    ///
    /// Any image already stored for the same page under a different
    /// extension is removed first, so a page never has two files.
    #[instrument(skip(self, bytes), fields(backend = self.backend.name(), size = bytes.len()))]
    pub async fn write_page_image(
        &self,
        series_id: SeriesId,
        chapter: ChapterNumber,
        page: u32,
        format: ImageFormat,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = Self::page_path(series_id, chapter, page, format)?;
        if let Some(existing) = self.find_page_image(series_id, chapter, page).await?
            && existing != path
        {
            self.backend.delete(&existing).await?;
        }
        self.backend.write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), "Wrote page image");
        Ok(path)
    }

    /// Read a page image by the relative path returned from
    /// [`write_page_image()`](Self::write_page_image).
    pub async fn read_page_image(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        self.backend.read(path.as_ref()).await
    }

    /// Remove the image of a page, whatever its extension.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the page has
    /// no image on disk.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn delete_page_image(&self, series_id: SeriesId, chapter: ChapterNumber, page: u32) -> Result<()> {
        let Some(path) = self.find_page_image(series_id, chapter, page).await? else {
            exn::bail!(ErrorKind::NotFound(Self::page_stem(series_id, chapter, page)?));
        };
        self.backend.delete(&path).await
    }

    /// Remove an image by the relative path recorded for it.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if nothing is
    /// stored there.
    #[instrument(skip(self, path), fields(backend = self.backend.name(), path = %path.as_ref().display()))]
    pub async fn delete_image(&self, path: impl AsRef<Path>) -> Result<()> {
        self.backend.delete(path.as_ref()).await
    }

    /// Move the image stored at `source` into the slot of page `to` of the
    /// given chapter, keeping its extension. Returns the new relative path.
    ///
    /// An image already occupying the target path is overwritten.
    #[instrument(skip(self, source), fields(backend = self.backend.name(), source = %source.as_ref().display()))]
    pub async fn rename_page_image(
        &self,
        source: impl AsRef<Path>,
        series_id: SeriesId,
        chapter: ChapterNumber,
        to: u32,
    ) -> Result<PathBuf> {
        let source = source.as_ref();
        let mut target = Self::page_stem(series_id, chapter, to)?;
        if let Some(extension) = source.extension() {
            target.set_extension(extension);
        }
        if target != source {
            self.backend.rename(source, &target).await?;
        }
        Ok(target)
    }

    /// Create the (possibly empty) directory of a chapter. Idempotent.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn create_chapter_directory(&self, series_id: SeriesId, chapter: ChapterNumber) -> Result<()> {
        self.backend.create_dir(&Self::chapter_directory(series_id, chapter)).await
    }

    /// Move a chapter directory to its new number.
    ///
    /// A chapter that has metadata but no directory yet (no pages were ever
    /// written) gets the new directory created directly.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn rename_chapter_directory(&self, series_id: SeriesId, old: ChapterNumber, new: ChapterNumber) -> Result<()> {
        let from = Self::chapter_directory(series_id, old);
        let to = Self::chapter_directory(series_id, new);
        if from == to {
            return self.backend.create_dir(&to).await;
        }
        match self.backend.exists(&from).await? {
            true => self.backend.rename(&from, &to).await,
            false => {
                tracing::debug!(path = %from.display(), "Chapter directory missing, creating new one instead");
                self.backend.create_dir(&to).await
            },
        }
    }

    /// Recursively remove a chapter directory; absence is not an error.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn delete_chapter_directory(&self, series_id: SeriesId, chapter: ChapterNumber) -> Result<()> {
        self.backend.delete_dir(&Self::chapter_directory(series_id, chapter)).await
    }

    /// Recursively remove everything stored for a series.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn delete_series_directory(&self, series_id: SeriesId) -> Result<()> {
        self.backend.delete_dir(&Self::series_directory(series_id)).await
    }
}
