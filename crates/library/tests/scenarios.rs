//! End-to-end lifecycle scenarios against a real directory tree.

use rstest::rstest;
use std::path::Path;
use std::sync::Arc;
use tankobon_catalog::Database;
use tankobon_library::Lifecycle;
use tankobon_library::error::ErrorKind;
use tankobon_models::{Chapter, ChapterNumber, NewChapter, NewSeries, SeriesId};
use tankobon_storage::backend::{LocalBackend, ReadOnlyBackend};
use tankobon_storage::{BackendHandle, PageStore};
use tempfile::TempDir;

const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0 jpeg";

struct Harness {
    root: TempDir,
    db: Database,
    backend: BackendHandle,
    lifecycle: Lifecycle,
    series_id: SeriesId,
}

impl Harness {
    async fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let db = Database::connect_in_memory().await.unwrap();
        let backend: BackendHandle = Arc::new(LocalBackend::new("images", root.path()).unwrap());
        let lifecycle = Lifecycle::new(PageStore::new(backend.clone()), &db);
        let series = lifecycle.create_series(&NewSeries::new("Series", "Author")).await.unwrap();
        Self {
            root,
            db,
            backend,
            lifecycle,
            series_id: series.id,
        }
    }

    fn read_only(&self) -> Lifecycle {
        Lifecycle::new(PageStore::new(Arc::new(ReadOnlyBackend::new(self.backend.clone()))), &self.db)
    }

    fn path(&self, relative: &str) -> std::path::PathBuf {
        self.root.path().join(relative)
    }

    async fn chapter(&self, number: u32, title: &str) -> Chapter {
        self.lifecycle
            .create_chapter(&NewChapter::new(self.series_id, ChapterNumber::whole(number).unwrap(), title))
            .await
            .unwrap()
    }

    async fn page_numbers(&self, chapter: &Chapter) -> Vec<u32> {
        let pages = self.lifecycle.list_pages(chapter.id).await.unwrap();
        pages.into_iter().map(|page| page.number).collect()
    }

    /// Page numbers are exactly `1..=page_count` and every page's file exists
    /// at the path derived from its number.
    async fn assert_consistent(&self, chapter: &Chapter) {
        let chapter = self.lifecycle.get_chapter(chapter.id).await.unwrap();
        let pages = self.lifecycle.list_pages(chapter.id).await.unwrap();
        let numbers: Vec<u32> = pages.iter().map(|page| page.number).collect();
        assert_eq!(numbers, (1..=chapter.page_count).collect::<Vec<_>>());
        for page in pages {
            assert_eq!(page.image_path.file_name().unwrap(), format!("page_{:03}.jpg", page.number).as_str());
            assert!(self.root.path().join(&page.image_path).is_file(), "{}", page.image_path.display());
        }
    }
}

#[tokio::test]
async fn scenario_a_pages_are_appended_in_order() {
    let h = Harness::new().await;
    let chapter = h.chapter(1, "Pilot").await;
    for _ in 0..3 {
        h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
    }
    assert_eq!(h.page_numbers(&chapter).await, [1, 2, 3]);
    assert_eq!(h.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 3);
    for n in 1..=3 {
        assert!(h.path(&format!("series_1/chapter_1.00/page_00{n}.jpg")).is_file());
    }
    h.assert_consistent(&chapter).await;
}

#[tokio::test]
async fn scenario_b_deleting_a_page_closes_the_gap() {
    let h = Harness::new().await;
    let chapter = h.chapter(1, "Pilot").await;
    for _ in 0..3 {
        h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
    }
    let second = h.lifecycle.list_pages(chapter.id).await.unwrap()[1].clone();
    h.lifecycle.delete_page(second.id).await.unwrap();

    assert_eq!(h.page_numbers(&chapter).await, [1, 2]);
    assert_eq!(h.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 2);
    assert!(!h.path("series_1/chapter_1.00/page_003.jpg").exists());
    h.assert_consistent(&chapter).await;
}

#[tokio::test]
async fn scenario_c_renumbering_moves_the_directory() {
    let h = Harness::new().await;
    let chapter = h.chapter(5, "X").await;
    let six = ChapterNumber::whole(6).unwrap();
    h.lifecycle.update_chapter(chapter.id, six, "X").await.unwrap();

    assert!(h.path("series_1/chapter_6.00").is_dir());
    assert!(!h.path("series_1/chapter_5.00").exists());
    assert_eq!(h.lifecycle.get_chapter(chapter.id).await.unwrap().number, six);
}

#[tokio::test]
async fn scenario_d_duplicate_chapter_is_a_conflict() {
    let h = Harness::new().await;
    h.chapter(1, "Pilot").await;
    let err = h
        .lifecycle
        .create_chapter(&NewChapter::new(h.series_id, ChapterNumber::whole(1).unwrap(), "Again"))
        .await
        .unwrap_err();
    assert!(matches!(&*err, ErrorKind::Conflict(_)));

    let directories: Vec<_> = std::fs::read_dir(h.path("series_1")).unwrap().collect();
    assert_eq!(directories.len(), 1);
    let chapters = h.lifecycle.list_chapters(h.series_id).await.unwrap();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].title, "Pilot");
}

#[tokio::test]
async fn scenario_e_failed_image_write_adds_nothing() {
    let h = Harness::new().await;
    let chapter = h.chapter(1, "Pilot").await;
    h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();

    let err = h.read_only().add_page(chapter.id, None, JPEG).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Storage { .. }));
    assert!(!err.to_string().contains("series_1"));
    assert_eq!(h.page_numbers(&chapter).await, [1]);
    assert_eq!(h.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, 1);
    assert!(!h.path("series_1/chapter_1.00/page_002.jpg").exists());
}

#[tokio::test]
async fn interrupted_page_delete_never_loses_a_live_image() {
    let h = Harness::new().await;
    let chapter = h.chapter(1, "Pilot").await;
    let mut uploaded = Vec::new();
    for n in 1..=3u8 {
        let mut bytes = JPEG.to_vec();
        bytes.push(n);
        h.lifecycle.add_page(chapter.id, None, &bytes).await.unwrap();
        uploaded.push(bytes);
    }
    let first = h.lifecycle.list_pages(chapter.id).await.unwrap().remove(0);
    h.read_only().delete_page(first.id).await.unwrap();

    let err = h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Conflict(_)));
    assert_eq!(std::fs::read(h.path("series_1/chapter_1.00/page_003.jpg")).unwrap(), uploaded[2]);

    let realignment = h.lifecycle.realign_pages(chapter.id).await.unwrap();
    assert_eq!(realignment.remaining, 0);
    h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
    h.assert_consistent(&chapter).await;
    let pages = h.lifecycle.list_pages(chapter.id).await.unwrap();
    let mut stored = Vec::new();
    for page in &pages {
        stored.push(h.lifecycle.read_page(page.id).await.unwrap().1);
    }
    assert_eq!(stored, [uploaded[1].clone(), uploaded[2].clone(), JPEG.to_vec()]);
}

#[tokio::test]
async fn renumbering_a_chapter_with_pages_keeps_them_readable() {
    let h = Harness::new().await;
    let chapter = h.chapter(2, "Two").await;
    let page = h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
    let number: ChapterNumber = "2.5".parse().unwrap();
    h.lifecycle.update_chapter(chapter.id, number, "Two and a half").await.unwrap();

    let (page, bytes) = h.lifecycle.read_page(page.id).await.unwrap();
    assert_eq!(page.image_path, Path::new("series_1/chapter_2.50/page_001.jpg"));
    assert_eq!(bytes, JPEG);
    h.assert_consistent(&chapter).await;
}

#[tokio::test]
async fn deleting_a_series_removes_its_tree() {
    let h = Harness::new().await;
    let chapter = h.chapter(1, "Pilot").await;
    h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
    h.lifecycle.delete_series(h.series_id).await.unwrap();
    assert!(!h.path("series_1").exists());
    let err = h.lifecycle.get_chapter(chapter.id).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
}

/// `+` appends a page, a digit deletes the page currently at that number.
#[rstest]
#[case("+++2")]
#[case("++++1111")]
#[case("+++++3+3+1+5")]
#[case("++1+1+1+1")]
#[case("++++4++5+1")]
#[tokio::test]
async fn page_numbers_stay_dense(#[case] script: &str) {
    let h = Harness::new().await;
    let chapter = h.chapter(1, "Pilot").await;
    let mut expected = 0u32;
    for step in script.chars() {
        match step.to_digit(10) {
            None => {
                h.lifecycle.add_page(chapter.id, None, JPEG).await.unwrap();
                expected += 1;
            },
            Some(number) => {
                let pages = h.lifecycle.list_pages(chapter.id).await.unwrap();
                let page = pages.iter().find(|page| page.number == number).unwrap();
                h.lifecycle.delete_page(page.id).await.unwrap();
                expected -= 1;
            },
        }
        h.assert_consistent(&chapter).await;
    }
    assert_eq!(h.lifecycle.get_chapter(chapter.id).await.unwrap().page_count, expected);
}
