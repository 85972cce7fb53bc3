//! Domain types for the chapter and page catalog.
//!
//! These types are shared between the [page store](https://docs.rs/tankobon-storage),
//! the [catalog database](https://docs.rs/tankobon-catalog) and the lifecycle
//! manager. They carry no I/O of their own.
//!
//! The one type worth reading up on is [`ChapterNumber`]: chapters are
//! positioned by a rational number (interstitial chapters like "4.5" exist), and
//! that number is also baked into the directory name on disk. It's stored as
//! exact hundredths so that equality and uniqueness never suffer from
//! floating-point drift.

mod chapter;
pub mod error;
mod image;
mod number;
mod page;
mod series;
#[cfg(feature = "serde")]
mod timestamp;

pub use crate::chapter::{Chapter, NewChapter};
pub use crate::image::ImageFormat;
pub use crate::number::ChapterNumber;
pub use crate::page::{MAX_PAGE_NUMBER, Page};
pub use crate::series::{DEFAULT_PAGE_SIZE, NewSeries, Series, SeriesFilter, SeriesList, SeriesSort, SeriesStatus};

/// Database identifier of a [`Series`].
pub type SeriesId = i64;
/// Database identifier of a [`Chapter`].
pub type ChapterId = i64;
/// Database identifier of a [`Page`].
pub type PageId = i64;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('-', "").replace('_', "").replace(' ', "")
}
