mod chapters;
mod series;

pub use self::chapters::{ChapterRepository, DeletedPage, Renumbered};
pub use self::series::SeriesRepository;
