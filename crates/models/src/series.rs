use crate::SeriesId;
use crate::error::{Error, ErrorKind};
use crate::sanitize;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;

/// Publication status of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SeriesStatus {
    /// Chapters are still being released
    #[default]
    Ongoing,
    /// The series has finished
    Completed,
    /// Releases are paused
    Hiatus,
}
impl SeriesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesStatus::Ongoing => "ongoing",
            SeriesStatus::Completed => "completed",
            SeriesStatus::Hiatus => "hiatus",
        }
    }
}
impl FromStr for SeriesStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "ongoing" | "publishing" => Self::Ongoing,
            "completed" | "complete" | "finished" => Self::Completed,
            "hiatus" | "onhiatus" | "paused" => Self::Hiatus,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "status",
                value: format!("unknown status: {s}")
            }),
        })
    }
}
impl Display for SeriesStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Catalogued work composed of ordered chapters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Series {
    pub id: SeriesId,
    pub title: String,
    /// Alternative (usually original-language) title
    pub alt_title: Option<String>,
    pub description: String,
    pub status: SeriesStatus,
    /// Average rating between `0.0` and `10.0`
    pub rating: f64,
    pub author: String,
    pub artist: Option<String>,
    /// Year of first publication
    pub year: Option<u16>,
    pub genres: BTreeSet<String>,
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::timestamp::serialize"))]
    pub created_at: UtcDateTime,
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::timestamp::serialize"))]
    pub updated_at: UtcDateTime,
}

/// Series attributes supplied by an administrator, before the database has
/// assigned an identifier.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct NewSeries {
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub alt_title: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: SeriesStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rating: f64,
    pub author: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub artist: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub year: Option<u16>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub genres: BTreeSet<String>,
}
impl NewSeries {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: SeriesStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_genres(mut self, genres: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }
}

/// Default number of series per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Sort key of a series listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SeriesSort {
    #[default]
    Title,
    Rating,
    /// Creation date
    Created,
    /// Last update
    Updated,
}
impl SeriesSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesSort::Title => "title",
            SeriesSort::Rating => "rating",
            SeriesSort::Created => "created",
            SeriesSort::Updated => "updated",
        }
    }
}
impl FromStr for SeriesSort {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "title" | "name" => Self::Title,
            "rating" | "score" => Self::Rating,
            "created" | "date" | "createdat" => Self::Created,
            "updated" | "updatedat" => Self::Updated,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "sort",
                value: format!("unknown sort key: {s}")
            }),
        })
    }
}
impl Display for SeriesSort {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Which series to list, in which order, and which page of the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesFilter {
    /// Only series tagged with this genre (exact match)
    pub genre: Option<String>,
    pub status: Option<SeriesStatus>,
    /// Case-insensitive substring of the title or alternative title
    pub search: Option<String>,
    pub sort: SeriesSort,
    pub descending: bool,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}
impl Default for SeriesFilter {
    fn default() -> Self {
        Self {
            genre: None,
            status: None,
            search: None,
            sort: SeriesSort::default(),
            descending: false,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
impl SeriesFilter {
    /// Number of matching series that precede the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of a filtered series listing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SeriesList {
    pub series: Vec<Series>,
    /// Matching series across all pages
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}
