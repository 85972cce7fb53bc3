//! Filesystem work that never changes the reported outcome of an operation.
//!
//! Two kinds of step end up here:
//!
//! - compensation, undoing a file write whose catalog insert failed;
//! - trailing removals, run after the catalog already committed a delete.
//!
//! In both cases the catalog holds the authoritative answer, so a failure is
//! logged and swallowed. Nothing is retried.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use tankobon_models::{ChapterNumber, SeriesId};
use tankobon_storage::PageStore;

/// A best-effort removal from the page store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// Image recorded for a page row that was deleted.
    Image { path: PathBuf },
    /// Image written for a page row that was never inserted.
    PageImage {
        series_id: SeriesId,
        chapter: ChapterNumber,
        page: u32,
    },
    /// Directory tree of a deleted chapter.
    ChapterDirectory { series_id: SeriesId, chapter: ChapterNumber },
    /// Directory tree of a deleted series.
    SeriesDirectory { series_id: SeriesId },
}

impl Cleanup {
    /// Run the removal, returning whether it succeeded.
    pub async fn run(self, pages: &PageStore) -> bool {
        let result = match &self {
            Self::Image { path } => pages.delete_image(path).await,
            Self::PageImage {
                series_id,
                chapter,
                page,
            } => pages.delete_page_image(*series_id, *chapter, *page).await,
            Self::ChapterDirectory { series_id, chapter } => pages.delete_chapter_directory(*series_id, *chapter).await,
            Self::SeriesDirectory { series_id } => pages.delete_series_directory(*series_id).await,
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(cleanup = %self, error = ?err, "Cleanup failed; leaving orphaned files behind");
                false
            },
        }
    }
}

impl Display for Cleanup {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Image { path } => write!(f, "image {}", path.display()),
            Self::PageImage {
                series_id,
                chapter,
                page,
            } => write!(f, "image of page {page} in chapter {chapter} of series {series_id}"),
            Self::ChapterDirectory { series_id, chapter } => {
                write!(f, "directory of chapter {chapter} of series {series_id}")
            },
            Self::SeriesDirectory { series_id } => write!(f, "directory of series {series_id}"),
        }
    }
}
