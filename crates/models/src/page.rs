use crate::{ChapterId, PageId};
use std::path::PathBuf;

/// Highest page number that fits the three-digit page filename.
pub const MAX_PAGE_NUMBER: u32 = 999;

/// Single image belonging to a chapter.
///
/// Page numbers are 1-based and dense: a chapter with `N` pages has exactly
/// the numbers `1..=N`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Page {
    pub id: PageId,
    pub chapter_id: ChapterId,
    pub number: u32,
    /// Path of the image file, relative to the images root
    pub image_path: PathBuf,
}
