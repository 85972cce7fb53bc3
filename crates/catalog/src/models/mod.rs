mod chapter;
mod page;
mod series;

pub(crate) use self::chapter::ChapterRow;
pub(crate) use self::page::PageRow;
pub(crate) use self::series::SeriesRow;

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use time::UtcDateTime;

pub(crate) fn timestamp(value: i64, field: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(value).or_raise(|| ErrorKind::InvalidData(field))
}

pub(crate) fn sqlx_hates_paths(path: &Path) -> Result<String> {
    Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("image path"))?.to_string())
}
