use crate::{ChapterId, ChapterNumber, SeriesId};
use time::UtcDateTime;

/// Numbered unit of a series containing ordered pages.
///
/// `page_count` is denormalized from the page rows; the catalog keeps it equal
/// to the number of pages after every page insert or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Chapter {
    pub id: ChapterId,
    pub series_id: SeriesId,
    pub number: ChapterNumber,
    pub title: String,
    pub page_count: u32,
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::timestamp::serialize"))]
    pub created_at: UtcDateTime,
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::timestamp::serialize"))]
    pub updated_at: UtcDateTime,
}

/// Chapter attributes supplied by an administrator.
///
/// Chapters are always created empty; pages are added one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct NewChapter {
    pub series_id: SeriesId,
    pub number: ChapterNumber,
    pub title: String,
}
impl NewChapter {
    pub fn new(series_id: SeriesId, number: ChapterNumber, title: impl Into<String>) -> Self {
        Self {
            series_id,
            number,
            title: title.into(),
        }
    }
}
