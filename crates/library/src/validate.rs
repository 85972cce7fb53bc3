//! Input checks run before any side effect.
//!
//! Everything here is pure: a rejected request never touches the page store
//! or the catalog.

use crate::Limits;
use crate::error::{ErrorKind, Result, validation};
use std::collections::BTreeSet;
use tankobon_models::{ImageFormat, MAX_PAGE_NUMBER, NewSeries, SeriesFilter};

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_RATING: f64 = 10.0;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Trim a required free-text field.
pub fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(validation(format!("{field} must be at most {MAX_TITLE_LENGTH} characters")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Normalize series attributes: trimmed text, blank optional fields dropped,
/// blank genres removed.
pub fn series(series: &NewSeries) -> Result<NewSeries> {
    if !series.rating.is_finite() || !(0.0..=MAX_RATING).contains(&series.rating) {
        return Err(validation(format!("rating must be between 0 and {MAX_RATING}")));
    }
    let genres: BTreeSet<String> = series
        .genres
        .iter()
        .map(|genre| genre.trim())
        .filter(|genre| !genre.is_empty())
        .map(str::to_string)
        .collect();
    Ok(NewSeries {
        title: required("title", &series.title)?,
        alt_title: optional(series.alt_title.as_deref()),
        description: series.description.trim().to_string(),
        status: series.status,
        rating: series.rating,
        author: required("author", &series.author)?,
        artist: optional(series.artist.as_deref()),
        year: series.year,
        genres,
    })
}

/// Normalize a listing filter: blank text criteria are dropped, and the
/// page must be 1-based with a size between 1 and [`MAX_PAGE_SIZE`].
pub fn series_filter(filter: &SeriesFilter) -> Result<SeriesFilter> {
    if filter.page == 0 {
        return Err(validation("page numbers start at 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&filter.page_size) {
        return Err(validation(format!("page size must be between 1 and {MAX_PAGE_SIZE}")));
    }
    Ok(SeriesFilter {
        genre: optional(filter.genre.as_deref()),
        search: optional(filter.search.as_deref()),
        ..filter.clone()
    })
}

/// Check an uploaded image against the size limit and detect its format from
/// its leading bytes.
pub fn image(bytes: &[u8], limits: &Limits) -> Result<ImageFormat> {
    if bytes.is_empty() {
        return Err(validation("image is empty"));
    }
    if bytes.len() > limits.max_image_size {
        return Err(validation(format!(
            "image is {} bytes, the limit is {}",
            bytes.len(),
            limits.max_image_size
        )));
    }
    ImageFormat::from_magic_bytes(bytes).ok_or_else(|| validation("image is not a JPEG, PNG, WebP or GIF file"))
}

/// Resolve the number of a page being appended to a chapter that currently
/// holds `page_count` pages.
///
/// `None` (or zero) appends. An explicit number must be the next free one:
/// anything already taken is a conflict, anything past the end would leave a
/// gap.
pub fn page_number(requested: Option<u32>, page_count: u32) -> Result<u32> {
    let next = page_count.saturating_add(1);
    let number = match requested {
        None | Some(0) => next,
        Some(n) if n <= page_count => exn::bail!(ErrorKind::Conflict(format!("page {n} already exists"))),
        Some(n) if n > next => {
            return Err(validation(format!("page {n} would leave a gap after page {page_count}")));
        },
        Some(n) => n,
    };
    if number > MAX_PAGE_NUMBER {
        return Err(validation(format!("a chapter holds at most {MAX_PAGE_NUMBER} pages")));
    }
    Ok(number)
}
