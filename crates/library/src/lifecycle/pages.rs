use super::Lifecycle;
use crate::cleanup::Cleanup;
use crate::error::{CatalogResultExt, ErrorKind, Result, StorageResultExt, not_found};
use crate::validate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tankobon_models::{Chapter, ChapterId, Page, PageId};
use tankobon_storage::PageStore;
use tankobon_storage::error::ErrorKind as StorageErrorKind;
use tracing::instrument;

/// Outcome of [`Lifecycle::realign_pages()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Realignment {
    /// Pages whose image now matches their number
    pub moved: usize,
    /// Pages still named after an old number
    pub remaining: usize,
}

/// A page whose image is stored under a filename other than its number's.
struct Misplaced<'a> {
    page_id: PageId,
    image: &'a Path,
    number: u32,
}

impl Lifecycle {
    /// Store an image as a page of a chapter.
    ///
    /// Without a number (or with zero) the page is appended. The image is
    /// written before the row is inserted; if the insert fails, the image is
    /// removed again. A slot whose file still belongs to another page is a
    /// conflict until the chapter is realigned.
    #[instrument(skip(self, image), fields(size = image.len()))]
    pub async fn add_page(&self, chapter_id: ChapterId, number: Option<u32>, image: &[u8]) -> Result<Page> {
        let format = validate::image(image, &self.limits)?;
        let chapter = self.require_chapter(chapter_id).await?;
        let number = validate::page_number(number, chapter.page_count)?;

        let slot = PageStore::page_stem(chapter.series_id, chapter.number, number).or_storage()?;
        let pages = self.chapters.list_pages(chapter_id).await.or_catalog()?;
        if let Some(holder) = pages.iter().find(|page| page.image_path.with_extension("") == slot) {
            tracing::warn!(page_id = holder.id, number, "Page slot still holds the image of another page");
            exn::bail!(ErrorKind::Conflict(format!(
                "image slot of page {number} is still used by page {}",
                holder.id
            )));
        }

        let image_path = self
            .pages
            .write_page_image(chapter.series_id, chapter.number, number, format, image)
            .await
            .or_storage()?;

        let id = match self.chapters.add_page(chapter_id, number, &image_path).await.or_catalog() {
            Ok(id) => id,
            Err(err) => {
                Cleanup::PageImage {
                    series_id: chapter.series_id,
                    chapter: chapter.number,
                    page: number,
                }
                .run(&self.pages)
                .await;
                return Err(err);
            },
        };
        tracing::info!(page_id = id, number, %format, "Added page");
        Ok(Page {
            id,
            chapter_id,
            number,
            image_path,
        })
    }

    /// Delete a page and close the gap it leaves.
    ///
    /// The catalog deletes and renumbers in one transaction. Afterwards the
    /// image recorded for the deleted row is removed and every page that
    /// moved down has its file renamed to match its new number, lowest first
    /// so that each rename lands in a slot that was just vacated. That
    /// trailing work is best-effort: the first failing rename ends it.
    #[instrument(skip(self))]
    pub async fn delete_page(&self, page_id: PageId) -> Result<Page> {
        let page = self.require_page(page_id).await?;
        let chapter = self.require_chapter(page.chapter_id).await?;
        let deleted = self.chapters.delete_page(page_id).await.or_catalog()?;

        Cleanup::Image {
            path: deleted.page.image_path.clone(),
        }
        .run(&self.pages)
        .await;
        let misplaced: Vec<Misplaced<'_>> = deleted
            .renumbered
            .iter()
            .map(|survivor| Misplaced {
                page_id: survivor.page_id,
                image: &survivor.image_path,
                number: survivor.to,
            })
            .collect();
        let realigned = self.realign_page_images(&chapter, &misplaced).await;

        tracing::info!(
            chapter_id = chapter.id,
            number = deleted.page.number,
            renumbered = deleted.renumbered.len(),
            realigned,
            "Deleted page"
        );
        Ok(deleted.page)
    }

    /// Rename every page image still named after an old page number, such as
    /// those left behind by a delete whose renames failed.
    #[instrument(skip(self))]
    pub async fn realign_pages(&self, chapter_id: ChapterId) -> Result<Realignment> {
        let chapter = self.require_chapter(chapter_id).await?;
        let pages = self.chapters.list_pages(chapter_id).await.or_catalog()?;
        let mut misplaced = Vec::new();
        for page in &pages {
            let slot = PageStore::page_stem(chapter.series_id, chapter.number, page.number).or_storage()?;
            if page.image_path.with_extension("") != slot {
                misplaced.push(Misplaced {
                    page_id: page.id,
                    image: &page.image_path,
                    number: page.number,
                });
            }
        }
        let moved = self.realign_page_images(&chapter, &misplaced).await;
        let realignment = Realignment {
            moved,
            remaining: misplaced.len() - moved,
        };
        tracing::info!(chapter_id, moved, remaining = realignment.remaining, "Realigned page images");
        Ok(realignment)
    }

    /// Rename the files of misplaced pages (ascending by number) and record
    /// their new paths. A slot whose file belongs to another row is never
    /// overwritten. Returns how many pages were brought in line.
    async fn realign_page_images(&self, chapter: &Chapter, misplaced: &[Misplaced<'_>]) -> usize {
        if misplaced.is_empty() {
            return 0;
        }
        let mut claimed: HashMap<PathBuf, PageId> = match self.chapters.list_pages(chapter.id).await {
            Ok(pages) => pages
                .into_iter()
                .map(|page| (page.image_path.with_extension(""), page.id))
                .collect(),
            Err(err) => {
                tracing::warn!(chapter_id = chapter.id, error = ?err, "Could not list pages; page images keep their old filenames");
                return 0;
            },
        };
        let mut moved: Vec<(PageId, PathBuf)> = Vec::with_capacity(misplaced.len());
        for page in misplaced {
            let slot = match PageStore::page_stem(chapter.series_id, chapter.number, page.number) {
                Ok(slot) => slot,
                Err(err) => {
                    tracing::warn!(chapter_id = chapter.id, page_id = page.page_id, error = ?err, "Page number has no image slot");
                    break;
                },
            };
            if let Some(&holder) = claimed.get(&slot)
                && holder != page.page_id
            {
                tracing::warn!(
                    chapter_id = chapter.id,
                    page_id = page.page_id,
                    holder,
                    number = page.number,
                    "Image slot still used by another page; later pages keep their old filenames"
                );
                break;
            }
            match self
                .pages
                .rename_page_image(page.image, chapter.series_id, chapter.number, page.number)
                .await
            {
                Ok(path) => {
                    claimed.remove(&page.image.with_extension(""));
                    claimed.insert(slot, page.page_id);
                    moved.push((page.page_id, path));
                },
                Err(err) => {
                    tracing::warn!(
                        chapter_id = chapter.id,
                        page_id = page.page_id,
                        from = %page.image.display(),
                        to = page.number,
                        error = ?err,
                        "Could not rename page image; later pages keep their old filenames"
                    );
                    break;
                },
            }
        }
        if !moved.is_empty()
            && let Err(err) = self.chapters.set_page_images(&moved).await
        {
            tracing::warn!(chapter_id = chapter.id, pages = moved.len(), error = ?err, "Page images renamed but catalog paths not updated");
        }
        moved.len()
    }

    async fn require_page(&self, id: PageId) -> Result<Page> {
        self.chapters
            .get_page(id)
            .await
            .or_catalog()?
            .ok_or_else(|| not_found(format!("page {id}")))
    }

    /// Pages of a chapter in ascending number order.
    pub async fn list_pages(&self, chapter_id: ChapterId) -> Result<Vec<Page>> {
        self.require_chapter(chapter_id).await?;
        self.chapters.list_pages(chapter_id).await.or_catalog()
    }

    /// A page record together with the bytes of its image.
    pub async fn read_page(&self, page_id: PageId) -> Result<(Page, Vec<u8>)> {
        let page = self.require_page(page_id).await?;
        match self.pages.read_page_image(&page.image_path).await {
            Ok(bytes) => Ok((page, bytes)),
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
                Err(err.raise(ErrorKind::NotFound(format!("image of page {page_id}"))))
            },
            Err(err) => Err(err).or_storage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{Limits, Realignment};
    use crate::lifecycle::fixture::{Fixture, JPEG, PNG, fixture, sabotage};
    use rstest::rstest;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tankobon_models::{Chapter, ChapterNumber, NewChapter, NewSeries};
    use tankobon_storage::backend::ReadOnlyBackend;
    use tankobon_storage::{PageStore, StorageBackend};

    async fn chapter(f: &Fixture) -> Chapter {
        let series = f.lifecycle.create_series(&NewSeries::new("Series", "Author")).await.unwrap();
        f.lifecycle
            .create_chapter(&NewChapter::new(series.id, ChapterNumber::whole(1).unwrap(), "One"))
            .await
            .unwrap()
    }

    /// A chapter holding `count` pages whose image bytes are `"<n>"` behind a
    /// PNG signature, so files can be told apart after renames.
    async fn chapter_with_pages(f: &Fixture, count: u32) -> Chapter {
        let chapter = chapter(f).await;
        for n in 1..=count {
            f.lifecycle.add_page(chapter.id, None, &image(n)).await.unwrap();
        }
        f.lifecycle.get_chapter(chapter.id).await.unwrap()
    }

    fn image(n: u32) -> Vec<u8> {
        let mut bytes = PNG[..8].to_vec();
        bytes.extend(n.to_string().into_bytes());
        bytes
    }

    async fn assert_dense(f: &Fixture, chapter: &Chapter) {
        let chapter = f.lifecycle.get_chapter(chapter.id).await.unwrap();
        let pages = f.lifecycle.list_pages(chapter.id).await.unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, (1..=chapter.page_count).collect::<Vec<_>>());
        for page in &pages {
            let expected = PageStore::page_path(chapter.series_id, chapter.number, page.number, tankobon_models::ImageFormat::Png).unwrap();
            assert_eq!(page.image_path, expected);
            assert!(f.backend.exists(&page.image_path).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_add_page_appends() {
        let f = fixture().await;
        let chapter = chapter(&f).await;
        let first = f.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
        let second = f.lifecycle.add_page(chapter.id, Some(0), PNG).await.unwrap();
        let third = f.lifecycle.add_page(chapter.id, Some(3), JPEG).await.unwrap();
        assert_eq!((first.number, second.number, third.number), (1, 2, 3));
        assert_eq!(second.image_path, Path::new("series_1/chapter_1.00/page_002.png"));
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 3);
        let (page, bytes) = f.lifecycle.read_page(second.id).await.unwrap();
        assert_eq!(page, second);
        assert_eq!(bytes, PNG);
    }

    #[rstest]
    #[case(Some(1), "conflict: page 1 already exists")]
    #[case(Some(4), "invalid input: page 4 would leave a gap after page 2")]
    #[tokio::test]
    async fn test_add_page_explicit_number_rejected(#[case] number: Option<u32>, #[case] expected: &str) {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 2).await;
        let err = f.lifecycle.add_page(chapter.id, number, JPEG).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        assert_eq!(f.backend.paths().await.len(), 2);
    }

    #[rstest]
    #[case(b"not an image".as_slice())]
    #[case(b"".as_slice())]
    #[tokio::test]
    async fn test_add_page_rejects_non_images(#[case] bytes: &[u8]) {
        let f = fixture().await;
        let chapter = chapter(&f).await;
        let err = f.lifecycle.add_page(chapter.id, None, bytes).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
        assert!(f.backend.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_page_size_limit() {
        let f = fixture().await;
        let lifecycle = f.lifecycle.clone().with_limits(Limits { max_image_size: 8 });
        let chapter = chapter(&f).await;
        let err = lifecycle.add_page(chapter.id, None, JPEG).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }

    #[tokio::test]
    async fn test_add_page_unknown_chapter() {
        let f = fixture().await;
        let err = f.lifecycle.add_page(5, None, JPEG).await.unwrap_err();
        assert_eq!(err.to_string(), "not found: chapter 5");
    }

    #[tokio::test]
    async fn test_add_page_insert_failure_removes_image() {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 1).await;
        sabotage(&f.db, "INSERT", "pages").await;
        let err = f.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Catalog { .. }));
        assert_eq!(f.backend.paths().await, [Path::new("series_1/chapter_1.00/page_001.png")]);
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 1);
    }

    #[tokio::test]
    async fn test_add_page_read_only_storage() {
        let f = fixture().await;
        let chapter = chapter(&f).await;
        let read_only = crate::Lifecycle::new(
            PageStore::new(Arc::new(ReadOnlyBackend::new(f.backend.clone()))),
            &f.db,
        );
        let err = read_only.add_page(chapter.id, None, JPEG).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage { .. }));
        assert_eq!(err.to_string(), "image storage failure");
        assert!(f.lifecycle.list_pages(chapter.id).await.unwrap().is_empty());
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 0);
    }

    #[rstest]
    #[case(1, &[2, 3, 4, 5])]
    #[case(3, &[1, 2, 4, 5])]
    #[case(5, &[1, 2, 3, 4])]
    #[tokio::test]
    async fn test_delete_page_renames_survivors(#[case] deleted: u32, #[case] survivors: &[u32]) {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 5).await;
        let page = f.lifecycle.list_pages(chapter.id).await.unwrap()[deleted as usize - 1].clone();

        let removed = f.lifecycle.delete_page(page.id).await.unwrap();
        assert_eq!(removed, page);
        assert_dense(&f, &chapter).await;

        // Every surviving file still holds the image it was uploaded with.
        let pages = f.lifecycle.list_pages(chapter.id).await.unwrap();
        for (page, original) in pages.iter().zip(survivors) {
            let (_, bytes) = f.lifecycle.read_page(page.id).await.unwrap();
            assert_eq!(bytes, image(*original));
        }
        assert_eq!(f.backend.paths().await.len(), 4);
    }

    #[tokio::test]
    async fn test_delete_every_page() {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 3).await;
        while let Some(page) = f.lifecycle.list_pages(chapter.id).await.unwrap().into_iter().next() {
            f.lifecycle.delete_page(page.id).await.unwrap();
            assert_dense(&f, &chapter).await;
        }
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 0);
        assert!(f.backend.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_page_missing_image_still_succeeds() {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 2).await;
        let first = f.lifecycle.list_pages(chapter.id).await.unwrap().remove(0);
        f.backend.delete(&first.image_path).await.unwrap();

        f.lifecycle.delete_page(first.id).await.unwrap();
        assert_dense(&f, &chapter).await;
    }

    #[tokio::test]
    async fn test_delete_page_on_read_only_storage() {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 3).await;
        let read_only = crate::Lifecycle::new(
            PageStore::new(Arc::new(ReadOnlyBackend::new(f.backend.clone()))),
            &f.db,
        );
        let first = f.lifecycle.list_pages(chapter.id).await.unwrap().remove(0);
        read_only.delete_page(first.id).await.unwrap();

        // Rows are dense, files were left alone and paths still point at them.
        let pages = f.lifecycle.list_pages(chapter.id).await.unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, [1, 2]);
        let images: Vec<PathBuf> = pages.into_iter().map(|p| p.image_path).collect();
        assert_eq!(
            images,
            [
                PathBuf::from("series_1/chapter_1.00/page_002.png"),
                PathBuf::from("series_1/chapter_1.00/page_003.png"),
            ]
        );
        assert_eq!(f.backend.paths().await.len(), 3);
    }

    async fn bytes_of(f: &Fixture, chapter: &Chapter) -> Vec<Vec<u8>> {
        let mut images = Vec::new();
        for page in f.lifecycle.list_pages(chapter.id).await.unwrap() {
            images.push(f.lifecycle.read_page(page.id).await.unwrap().1);
        }
        images
    }

    /// Deletes the first of three pages without touching any file, so the
    /// survivors keep the filenames of pages 2 and 3.
    async fn chapter_with_stale_filenames(f: &Fixture) -> Chapter {
        let chapter = chapter_with_pages(f, 3).await;
        let read_only = crate::Lifecycle::new(
            PageStore::new(Arc::new(ReadOnlyBackend::new(f.backend.clone()))),
            &f.db,
        );
        let first = f.lifecycle.list_pages(chapter.id).await.unwrap().remove(0);
        read_only.delete_page(first.id).await.unwrap();
        f.lifecycle.get_chapter(chapter.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_into_stale_slot_is_a_conflict() {
        let f = fixture().await;
        let chapter = chapter_with_stale_filenames(&f).await;
        let last = f.lifecycle.list_pages(chapter.id).await.unwrap().remove(1);
        assert_eq!(last.image_path, Path::new("series_1/chapter_1.00/page_003.png"));

        let err = f.lifecycle.add_page(chapter.id, None, &image(9)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("conflict: image slot of page 3 is still used by page {}", last.id)
        );
        assert_eq!(bytes_of(&f, &chapter).await, [image(2), image(3)]);
        assert_eq!(f.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 2);

        let realignment = f.lifecycle.realign_pages(chapter.id).await.unwrap();
        assert_eq!(realignment, Realignment { moved: 2, remaining: 0 });
        let added = f.lifecycle.add_page(chapter.id, None, &image(9)).await.unwrap();
        assert_eq!(added.number, 3);
        assert_dense(&f, &chapter).await;
        assert_eq!(bytes_of(&f, &chapter).await, [image(2), image(3), image(9)]);
        assert_eq!(f.backend.paths().await.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_after_stale_rename_removes_only_its_own_image() {
        let f = fixture().await;
        let chapter = chapter_with_stale_filenames(&f).await;
        let pages = f.lifecycle.list_pages(chapter.id).await.unwrap();

        // Page 2 is stored as page_003; page_002 belongs to page 1.
        f.lifecycle.delete_page(pages[1].id).await.unwrap();
        assert_eq!(bytes_of(&f, &chapter).await, [image(2)]);
        assert!(!f.backend.exists(Path::new("series_1/chapter_1.00/page_003.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_closes_gap_around_stale_filenames() {
        let f = fixture().await;
        let chapter = chapter_with_stale_filenames(&f).await;
        f.lifecycle.add_page(chapter.id, Some(3), &image(4)).await.unwrap_err();
        f.lifecycle.realign_pages(chapter.id).await.unwrap();
        f.lifecycle.add_page(chapter.id, None, &image(4)).await.unwrap();

        let first = f.lifecycle.list_pages(chapter.id).await.unwrap().remove(0);
        f.lifecycle.delete_page(first.id).await.unwrap();
        assert_dense(&f, &chapter).await;
        assert_eq!(bytes_of(&f, &chapter).await, [image(3), image(4)]);
    }

    #[tokio::test]
    async fn test_realign_pages() {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 2).await;
        let aligned = f.lifecycle.realign_pages(chapter.id).await.unwrap();
        assert_eq!(aligned, Realignment { moved: 0, remaining: 0 });

        let chapter = chapter_with_stale_filenames(&f).await;
        let read_only = crate::Lifecycle::new(
            PageStore::new(Arc::new(ReadOnlyBackend::new(f.backend.clone()))),
            &f.db,
        );
        let stuck = read_only.realign_pages(chapter.id).await.unwrap();
        assert_eq!(stuck, Realignment { moved: 0, remaining: 2 });
        assert_eq!(bytes_of(&f, &chapter).await, [image(2), image(3)]);

        let err = f.lifecycle.realign_pages(404).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_pages() {
        let f = fixture().await;
        assert_eq!(f.lifecycle.delete_page(3).await.unwrap_err().to_string(), "not found: page 3");
        assert!(matches!(&*f.lifecycle.read_page(3).await.unwrap_err(), ErrorKind::NotFound(_)));
        assert!(matches!(&*f.lifecycle.list_pages(3).await.unwrap_err(), ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_page_without_image() {
        let f = fixture().await;
        let chapter = chapter_with_pages(&f, 1).await;
        let page = f.lifecycle.list_pages(chapter.id).await.unwrap().remove(0);
        f.backend.delete(&page.image_path).await.unwrap();
        let err = f.lifecycle.read_page(page.id).await.unwrap_err();
        assert_eq!(err.to_string(), format!("not found: image of page {}", page.id));
    }
}
