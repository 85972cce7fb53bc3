use super::Lifecycle;
use crate::cleanup::Cleanup;
use crate::error::{CatalogResultExt, ErrorKind, Result, StorageResultExt};
use crate::validate;
use tankobon_models::{Chapter, ChapterId, ChapterNumber, NewChapter, SeriesId};
use tankobon_storage::PageStore;
use tracing::instrument;

impl Lifecycle {
    async fn ensure_number_free(&self, series_id: SeriesId, number: ChapterNumber) -> Result<()> {
        if self.chapters.find_chapter(series_id, number).await.or_catalog()?.is_some() {
            exn::bail!(ErrorKind::Conflict(format!("chapter {number} of series {series_id}")));
        }
        Ok(())
    }

    /// Create an empty chapter: directory first, then the row.
    ///
    /// A directory that can't be created aborts with nothing written. A row
    /// that can't be inserted leaves the (empty) directory behind; it is
    /// reused if the chapter is created again.
    #[instrument(skip(self, chapter), fields(series_id = chapter.series_id, number = %chapter.number))]
    pub async fn create_chapter(&self, chapter: &NewChapter) -> Result<Chapter> {
        let title = validate::required("title", &chapter.title)?;
        self.require_series(chapter.series_id).await?;
        // Checked up front so that a duplicate never touches the filesystem.
        self.ensure_number_free(chapter.series_id, chapter.number).await?;

        self.pages
            .create_chapter_directory(chapter.series_id, chapter.number)
            .await
            .or_storage()?;

        let now = self.clock.now();
        let chapter = NewChapter::new(chapter.series_id, chapter.number, title);
        let id = match self.chapters.create_chapter(&chapter, 0, now).await.or_catalog() {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = ?err, "Chapter row not inserted; leaving its directory behind");
                return Err(err);
            },
        };
        tracing::info!(chapter_id = id, "Created chapter");
        Ok(Chapter {
            id,
            series_id: chapter.series_id,
            number: chapter.number,
            title: chapter.title,
            page_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_chapter(&self, id: ChapterId) -> Result<Chapter> {
        self.require_chapter(id).await
    }

    /// Chapters of a series in ascending number order.
    pub async fn list_chapters(&self, series_id: SeriesId) -> Result<Vec<Chapter>> {
        self.require_series(series_id).await?;
        self.chapters.list_chapters(series_id).await.or_catalog()
    }

    /// Change the number and title of a chapter.
    ///
    /// When the number changes, the directory is renamed before the row is
    /// touched; a failed rename leaves the row on the old (still correct)
    /// number. Once the directory has moved, the chapter row and every page
    /// path are rewritten in one transaction. If that transaction fails the
    /// directory and the row disagree; this is logged and not repaired.
    #[instrument(skip(self))]
    pub async fn update_chapter(&self, id: ChapterId, number: ChapterNumber, title: &str) -> Result<Chapter> {
        let title = validate::required("title", title)?;
        let current = self.require_chapter(id).await?;
        let renumbered = number != current.number;

        let mut images = Vec::new();
        if renumbered {
            self.ensure_number_free(current.series_id, number).await?;
            let directory = PageStore::chapter_directory(current.series_id, number);
            for page in self.chapters.list_pages(id).await.or_catalog()? {
                if let Some(name) = page.image_path.file_name() {
                    images.push((page.id, directory.join(name)));
                }
            }
            self.pages
                .rename_chapter_directory(current.series_id, current.number, number)
                .await
                .or_storage()?;
        }

        let updated = Chapter {
            number,
            title,
            updated_at: self.clock.now(),
            ..current.clone()
        };
        if let Err(err) = self.chapters.update_chapter_with_pages(&updated, &images).await.or_catalog() {
            if renumbered {
                tracing::warn!(
                    chapter_id = id,
                    from = %current.number,
                    to = %number,
                    error = ?err,
                    "Chapter directory was renamed but the catalog still has the old number"
                );
            }
            return Err(err);
        }
        tracing::info!(chapter_id = id, from = %current.number, to = %number, "Updated chapter");
        Ok(updated)
    }

    /// Delete a chapter and its pages.
    ///
    /// The row is authoritative and goes first; its directory is removed
    /// afterwards on a best-effort basis.
    #[instrument(skip(self))]
    pub async fn delete_chapter(&self, id: ChapterId) -> Result<Chapter> {
        let chapter = self.require_chapter(id).await?;
        self.chapters.delete_chapter(id).await.or_catalog()?;
        Cleanup::ChapterDirectory {
            series_id: chapter.series_id,
            chapter: chapter.number,
        }
        .run(&self.pages)
        .await;
        tracing::info!(chapter_id = id, "Deleted chapter");
        Ok(chapter)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::lifecycle::fixture::{Fixture, JPEG, PNG, fixture, sabotage, start};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tankobon_models::{Chapter, ChapterNumber, NewChapter, NewSeries, SeriesFilter};
    use tankobon_storage::backend::ReadOnlyBackend;
    use tankobon_storage::{PageStore, StorageBackend};
    use time::Duration;

    fn number(s: &str) -> ChapterNumber {
        s.parse().unwrap()
    }

    async fn chapter(f: &Fixture, n: &str) -> Chapter {
        let listed = f.lifecycle.list_series(&SeriesFilter::default()).await.unwrap();
        let series = match listed.series.into_iter().next() {
            Some(series) => series,
            None => f.lifecycle.create_series(&NewSeries::new("Series", "Author")).await.unwrap(),
        };
        f.lifecycle
            .create_chapter(&NewChapter::new(series.id, number(n), "Chapter"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_chapter() {
        let f = fixture().await;
        let chapter = chapter(&f, "4.5").await;
        assert_eq!(chapter.page_count, 0);
        assert_eq!(chapter.created_at, start());
        assert!(f.backend.exists(Path::new("series_1/chapter_4.50")).await.unwrap());
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap(), chapter);
    }

    #[tokio::test]
    async fn test_create_chapter_unknown_series() {
        let f = fixture().await;
        let err = f
            .lifecycle
            .create_chapter(&NewChapter::new(9, number("1"), "Orphan"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not found: series 9");
        assert!(!f.backend.exists(Path::new("series_9")).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_chapter_blank_title() {
        let f = fixture().await;
        let series = f.lifecycle.create_series(&NewSeries::new("Series", "Author")).await.unwrap();
        let err = f
            .lifecycle
            .create_chapter(&NewChapter::new(series.id, number("1"), "  "))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_chapter_storage_failure_writes_nothing() {
        let f = fixture().await;
        let series = f.lifecycle.create_series(&NewSeries::new("Series", "Author")).await.unwrap();
        let read_only = crate::Lifecycle::new(
            PageStore::new(Arc::new(ReadOnlyBackend::new(f.backend.clone()))),
            &f.db,
        );
        let err = read_only
            .create_chapter(&NewChapter::new(series.id, number("1"), "One"))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage { .. }));
        assert!(f.lifecycle.list_chapters(series.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_chapter_insert_failure_leaves_directory() {
        let f = fixture().await;
        let series = f.lifecycle.create_series(&NewSeries::new("Series", "Author")).await.unwrap();
        sabotage(&f.db, "INSERT", "chapters").await;
        let err = f
            .lifecycle
            .create_chapter(&NewChapter::new(series.id, number("2"), "Two"))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Catalog { .. }));
        assert!(f.backend.exists(Path::new("series_1/chapter_2.00")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_chapter_renames_directory_and_pages() {
        let f = fixture().await;
        let chapter = chapter(&f, "5").await;
        f.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
        f.lifecycle.add_page(chapter.id, None, PNG).await.unwrap();
        f.clock.advance(Duration::minutes(5));

        let updated = f.lifecycle.update_chapter(chapter.id, number("6"), "Renamed").await.unwrap();
        assert_eq!(updated.number, number("6"));
        assert_eq!(updated.page_count, 2);
        assert_eq!(updated.created_at, start());
        assert_eq!(updated.updated_at, start() + Duration::minutes(5));
        assert_eq!(
            f.backend.paths().await,
            [
                PathBuf::from("series_1/chapter_6.00/page_001.jpg"),
                PathBuf::from("series_1/chapter_6.00/page_002.png"),
            ]
        );
        let images: Vec<PathBuf> = f
            .lifecycle
            .list_pages(chapter.id)
            .await
            .unwrap()
            .into_iter()
            .map(|page| page.image_path)
            .collect();
        assert_eq!(images, f.backend.paths().await);
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_chapter_title_only() {
        let f = fixture().await;
        let chapter = chapter(&f, "1").await;
        let updated = f.lifecycle.update_chapter(chapter.id, number("1"), "New Title").await.unwrap();
        assert_eq!(updated.title, "New Title");
        assert!(f.backend.exists(Path::new("series_1/chapter_1.00")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_chapter_to_taken_number() {
        let f = fixture().await;
        let one = chapter(&f, "1").await;
        chapter(&f, "2").await;
        f.lifecycle.add_page(one.id, None, JPEG).await.unwrap();
        let err = f.lifecycle.update_chapter(one.id, number("2"), "Chapter").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        assert!(f.backend.exists(Path::new("series_1/chapter_1.00/page_001.jpg")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_chapter_failed_row_update_keeps_moved_directory() {
        let f = fixture().await;
        let chapter = chapter(&f, "3").await;
        f.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
        sabotage(&f.db, "UPDATE", "chapters").await;

        let err = f.lifecycle.update_chapter(chapter.id, number("4"), "Chapter").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Catalog { .. }));
        // The recognized inconsistency: directory moved, row did not.
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap().number, number("3"));
        assert_eq!(f.backend.paths().await, [Path::new("series_1/chapter_4.00/page_001.jpg")]);
    }

    #[tokio::test]
    async fn test_update_chapter_failed_directory_rename_changes_nothing() {
        let f = fixture().await;
        let chapter = chapter(&f, "3").await;
        let page = f.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
        let read_only = crate::Lifecycle::new(
            PageStore::new(Arc::new(ReadOnlyBackend::new(f.backend.clone()))),
            &f.db,
        );

        let err = read_only.update_chapter(chapter.id, number("4"), "Renamed").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage { retryable: false }));
        let current = f.lifecycle.get_chapter(chapter.id).await.unwrap();
        assert_eq!((current.number, current.title.as_str(), current.page_count), (number("3"), "Chapter", 1));
        assert_eq!(f.lifecycle.list_pages(chapter.id).await.unwrap(), [page.clone()]);
        assert_eq!(f.backend.paths().await, [page.image_path.clone()]);
        let (_, bytes) = f.lifecycle.read_page(page.id).await.unwrap();
        assert_eq!(bytes, JPEG);
    }

    #[tokio::test]
    async fn test_update_chapter_onto_occupied_directory_changes_nothing() {
        let f = fixture().await;
        let chapter = chapter(&f, "3").await;
        let page = f.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
        f.backend.write(Path::new("series_1/chapter_4.00/page_001.png"), PNG).await.unwrap();

        let err = f.lifecycle.update_chapter(chapter.id, number("4"), "Renamed").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage { .. }));
        let current = f.lifecycle.get_chapter(chapter.id).await.unwrap();
        assert_eq!((current.number, current.title.as_str()), (number("3"), "Chapter"));
        assert_eq!(f.lifecycle.list_pages(chapter.id).await.unwrap(), [page]);
        assert_eq!(
            f.backend.paths().await,
            [
                Path::new("series_1/chapter_3.00/page_001.jpg"),
                Path::new("series_1/chapter_4.00/page_001.png"),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_missing_chapter() {
        let f = fixture().await;
        let err = f.lifecycle.update_chapter(77, number("1"), "Title").await.unwrap_err();
        assert_eq!(err.to_string(), "not found: chapter 77");
    }

    #[tokio::test]
    async fn test_delete_chapter() {
        let f = fixture().await;
        let doomed = chapter(&f, "1").await;
        let kept = chapter(&f, "2").await;
        f.lifecycle.add_page(doomed.id, None, JPEG).await.unwrap();
        f.lifecycle.add_page(kept.id, None, JPEG).await.unwrap();

        let deleted = f.lifecycle.delete_chapter(doomed.id).await.unwrap();
        assert_eq!(deleted.id, doomed.id);
        assert!(!f.backend.exists(Path::new("series_1/chapter_1.00")).await.unwrap());
        assert_eq!(f.backend.paths().await, [Path::new("series_1/chapter_2.00/page_001.jpg")]);
        let remaining: Vec<_> = f.lifecycle.list_chapters(1).await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(remaining, [kept.id]);
    }

    #[tokio::test]
    async fn test_delete_chapter_directory_failure_is_not_an_error() {
        let f = fixture().await;
        let chapter = chapter(&f, "1").await;
        f.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
        let read_only = crate::Lifecycle::new(
            PageStore::new(Arc::new(ReadOnlyBackend::new(f.backend.clone()))),
            &f.db,
        );
        read_only.delete_chapter(chapter.id).await.unwrap();
        let err = f.lifecycle.get_chapter(chapter.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert_eq!(f.backend.paths().await, [Path::new("series_1/chapter_1.00/page_001.jpg")]);
    }
}
