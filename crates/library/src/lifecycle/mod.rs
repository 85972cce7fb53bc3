//! Chapter Lifecycle Manager
//!
//! Every mutation is a short saga over two stores that cannot commit
//! together: image files in the [`PageStore`] and rows in the catalog. The
//! order of the steps is fixed per operation so that the side which is
//! cheaper to undo always goes first:
//!
//! | Operation        | First step              | Second step          | If the second step fails                  |
//! |------------------|-------------------------|----------------------|-------------------------------------------|
//! | create chapter   | create directory        | insert row           | directory left behind (harmless)          |
//! | renumber chapter | rename directory        | update row and paths | logged inconsistency, not repaired        |
//! | delete chapter   | delete row              | remove directory     | logged, orphaned directory                |
//! | add page         | write image             | insert row           | image removed ([`Cleanup::PageImage`])    |
//! | delete page      | delete row, renumber    | remove and rename    | logged, later renames skipped             |
//!
//! A failing first step always aborts the operation with nothing changed.
//! Steps that follow a committed catalog change are best-effort: they log a
//! warning and never turn a success into an error.
//!
//! A page whose image kept its old filename still owns that file. Until
//! [`Lifecycle::realign_pages()`] moves it into place, appending a page whose
//! slot it occupies is a conflict, and no rename overwrites it.
//!
//! Concurrent mutations of the *same* chapter are not serialized here and
//! must be serialized by the caller.

mod chapters;
mod pages;
mod series;

pub use self::pages::Realignment;

use crate::clock::{Clock, SystemClock};
use crate::error::{CatalogResultExt, Result, not_found};
use std::sync::Arc;
use tankobon_catalog::{ChapterRepository, Database, SeriesRepository};
use tankobon_models::{Chapter, ChapterId, SeriesId};
use tankobon_storage::PageStore;

#[cfg(doc)]
use crate::cleanup::Cleanup;

/// Default upload cap: 5 MiB.
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Resource limits enforced before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest accepted page image, in bytes.
    pub max_image_size: usize,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

/// Keeps image files and catalog rows of series, chapters and pages
/// consistent across mutations.
#[derive(Clone)]
pub struct Lifecycle {
    pages: PageStore,
    series: SeriesRepository,
    chapters: ChapterRepository,
    clock: Arc<dyn Clock>,
    limits: Limits,
}

impl Lifecycle {
    pub fn new(pages: PageStore, catalog: &Database) -> Self {
        Self {
            pages,
            series: SeriesRepository::from(catalog),
            chapters: ChapterRepository::from(catalog),
            clock: Arc::new(SystemClock),
            limits: Limits::default(),
        }
    }

    /// Replace the time source used to stamp created/updated times.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn page_store(&self) -> &PageStore {
        &self.pages
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    async fn require_series(&self, id: SeriesId) -> Result<()> {
        match self.series.series_exists(id).await.or_catalog()? {
            true => Ok(()),
            false => Err(not_found(format!("series {id}"))),
        }
    }

    async fn require_chapter(&self, id: ChapterId) -> Result<Chapter> {
        self.chapters
            .get_chapter(id)
            .await
            .or_catalog()?
            .ok_or_else(|| not_found(format!("chapter {id}")))
    }
}
