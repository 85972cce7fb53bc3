//! Repository for chapters and their pages.
//!
//! Pages are owned by their chapter: deleting a chapter cascades to its page
//! rows. Every multi-statement operation runs in one transaction so that, after
//! any completed call, a chapter's pages are numbered exactly
//! `1..=page_count` and `page_count` equals the number of page rows.

use crate::Database;
use crate::error::{ClassifyExt, ErrorKind, Result};
use crate::models::{ChapterRow, PageRow, sqlx_hates_paths};
use exn::ResultExt;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use tankobon_models::{Chapter, ChapterId, ChapterNumber, NewChapter, Page, PageId, SeriesId};
use time::UtcDateTime;

/// A surviving page whose number changed while closing the gap left by a
/// deleted page. `image_path` still points at the file for the old number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renumbered {
    pub page_id: PageId,
    pub from: u32,
    pub to: u32,
    pub image_path: PathBuf,
}

/// Outcome of [`ChapterRepository::delete_page()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPage {
    /// The row as it was before deletion
    pub page: Page,
    /// Surviving pages that moved down, in ascending order
    pub renumbered: Vec<Renumbered>,
}

/// Repository for [`Chapter`] and [`Page`] records.
#[derive(Debug, Clone)]
pub struct ChapterRepository {
    pool: SqlitePool,
}
impl From<&Database> for ChapterRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl ChapterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn describe(series_id: SeriesId, number: ChapterNumber) -> String {
        format!("chapter {number} of series {series_id}")
    }

    // =========================================================================
    // Chapters
    // =========================================================================

    /// Insert a chapter row.
    ///
    /// Returns [`ErrorKind::Conflict`] if the series already has a chapter
    /// with that number, and [`ErrorKind::NotFound`] if the series doesn't
    /// exist (foreign key violation). Callers should check the series first;
    /// the foreign key is only the last line of defence.
    pub async fn create_chapter(&self, chapter: &NewChapter, page_count: u32, now: UtcDateTime) -> Result<ChapterId> {
        let id: ChapterId = sqlx::query_scalar(include_str!("../../queries/insert_chapter.sql"))
            .bind(chapter.series_id)
            .bind(i64::from(chapter.number.hundredths()))
            .bind(&chapter.title)
            .bind(i64::from(page_count))
            .bind(now.unix_timestamp())
            .fetch_one(&self.pool)
            .await
            .or_classify(|| Self::describe(chapter.series_id, chapter.number))?;
        tracing::debug!(chapter_id = id, series_id = chapter.series_id, number = %chapter.number, "Inserted chapter");
        Ok(id)
    }

    pub async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>> {
        let row: Option<ChapterRow> = sqlx::query_as(include_str!("../../queries/get_chapter.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Chapter::try_from).transpose()
    }

    /// Look up a chapter by its position within a series.
    pub async fn find_chapter(&self, series_id: SeriesId, number: ChapterNumber) -> Result<Option<Chapter>> {
        let row: Option<ChapterRow> = sqlx::query_as(include_str!("../../queries/find_chapter.sql"))
            .bind(series_id)
            .bind(i64::from(number.hundredths()))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Chapter::try_from).transpose()
    }

    /// List the chapters of a series in ascending number order.
    pub async fn list_chapters(&self, series_id: SeriesId) -> Result<Vec<Chapter>> {
        let rows: Vec<ChapterRow> = sqlx::query_as(include_str!("../../queries/list_chapters.sql"))
            .bind(series_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Chapter::try_from).collect()
    }

    async fn write_chapter(tx: &mut Transaction<'_, Sqlite>, chapter: &Chapter) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/update_chapter.sql"))
            .bind(chapter.id)
            .bind(i64::from(chapter.number.hundredths()))
            .bind(&chapter.title)
            .bind(i64::from(chapter.page_count))
            .bind(chapter.updated_at.unix_timestamp())
            .execute(&mut **tx)
            .await
            .or_classify(|| Self::describe(chapter.series_id, chapter.number))?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(format!("chapter {}", chapter.id)));
        }
        Ok(())
    }

    async fn write_page_images(tx: &mut Transaction<'_, Sqlite>, images: &[(PageId, PathBuf)]) -> Result<()> {
        for (page_id, path) in images {
            let result = sqlx::query(include_str!("../../queries/update_page_image.sql"))
                .bind(page_id)
                .bind(sqlx_hates_paths(path)?)
                .execute(&mut **tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            if result.rows_affected() == 0 {
                exn::bail!(ErrorKind::NotFound(format!("page {page_id}")));
            }
        }
        Ok(())
    }

    /// Replace number, title, page count and update time of a chapter.
    ///
    /// Returns [`ErrorKind::NotFound`] if no chapter has that id and
    /// [`ErrorKind::Conflict`] if the new number is taken.
    pub async fn update_chapter(&self, chapter: &Chapter) -> Result<()> {
        self.update_chapter_with_pages(chapter, &[]).await
    }

    /// Same as [`update_chapter()`](Self::update_chapter), also rewriting the
    /// image path of the given pages in the same transaction.
    pub async fn update_chapter_with_pages(&self, chapter: &Chapter, images: &[(PageId, PathBuf)]) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::write_chapter(&mut tx, chapter).await?;
        Self::write_page_images(&mut tx, images).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(chapter_id = chapter.id, pages = images.len(), "Updated chapter");
        Ok(())
    }

    /// Delete a chapter row; its page rows are removed by cascade.
    ///
    /// Returns [`ErrorKind::NotFound`] if no chapter has that id.
    pub async fn delete_chapter(&self, id: ChapterId) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/delete_chapter.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(format!("chapter {id}")));
        }
        tracing::debug!(chapter_id = id, "Deleted chapter");
        Ok(())
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// List the pages of a chapter in ascending number order.
    pub async fn list_pages(&self, chapter_id: ChapterId) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(include_str!("../../queries/list_pages.sql"))
            .bind(chapter_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Page::try_from).collect()
    }

    pub async fn get_page(&self, id: PageId) -> Result<Option<Page>> {
        let row: Option<PageRow> = sqlx::query_as(include_str!("../../queries/get_page.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Page::try_from).transpose()
    }

    async fn recount_pages(tx: &mut Transaction<'_, Sqlite>, chapter_id: ChapterId) -> Result<()> {
        sqlx::query(include_str!("../../queries/recount_pages.sql"))
            .bind(chapter_id)
            .execute(&mut **tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Insert a page row and recompute the chapter's page count, atomically.
    ///
    /// Returns [`ErrorKind::Conflict`] if the chapter already has a page with
    /// that number and [`ErrorKind::NotFound`] if the chapter doesn't exist.
    pub async fn add_page(&self, chapter_id: ChapterId, number: u32, image_path: impl AsRef<Path>) -> Result<PageId> {
        let image_path = sqlx_hates_paths(image_path.as_ref())?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let id: PageId = sqlx::query_scalar(include_str!("../../queries/insert_page.sql"))
            .bind(chapter_id)
            .bind(i64::from(number))
            .bind(image_path)
            .fetch_one(&mut *tx)
            .await
            .or_classify(|| format!("page {number} of chapter {chapter_id}"))?;
        Self::recount_pages(&mut tx, chapter_id).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(page_id = id, chapter_id, number, "Inserted page");
        Ok(id)
    }

    /// Delete a page, close the gap in the numbering and recompute the page
    /// count, all in one transaction.
    ///
    /// Surviving pages keep their relative order. The returned
    /// [`DeletedPage`] lists every page whose number changed so the caller can
    /// bring files on disk in line.
    ///
    /// Returns [`ErrorKind::NotFound`] if no page has that id.
    pub async fn delete_page(&self, id: PageId) -> Result<DeletedPage> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let row: Option<PageRow> = sqlx::query_as(include_str!("../../queries/get_page.sql"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let page = match row {
            Some(row) => Page::try_from(row)?,
            None => exn::bail!(ErrorKind::NotFound(format!("page {id}"))),
        };
        sqlx::query(include_str!("../../queries/delete_page.sql"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let survivors: Vec<PageRow> = sqlx::query_as(include_str!("../../queries/list_pages.sql"))
            .bind(page.chapter_id)
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../../queries/negate_page_numbers.sql"))
            .bind(page.chapter_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../../queries/rank_page_numbers.sql"))
            .bind(page.chapter_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::recount_pages(&mut tx, page.chapter_id).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;

        // Ranking is by prior number, so survivor `n` (0-based) is now `n + 1`.
        let mut renumbered = Vec::new();
        for (position, row) in (1u32..).zip(survivors) {
            let survivor = Page::try_from(row)?;
            if survivor.number != position {
                renumbered.push(Renumbered {
                    page_id: survivor.id,
                    from: survivor.number,
                    to: position,
                    image_path: survivor.image_path,
                });
            }
        }
        tracing::debug!(page_id = id, chapter_id = page.chapter_id, renumbered = renumbered.len(), "Deleted page");
        Ok(DeletedPage { page, renumbered })
    }

    /// Rewrite the image path of several pages in one transaction.
    pub async fn set_page_images(&self, images: &[(PageId, PathBuf)]) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::write_page_images(&mut tx, images).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
