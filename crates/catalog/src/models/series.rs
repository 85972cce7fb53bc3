use crate::error::{Error, ErrorKind};
use crate::models::timestamp;
use exn::ResultExt;
use std::collections::BTreeSet;
use tankobon_models::{Series, SeriesStatus};

#[derive(sqlx::FromRow)]
pub(crate) struct SeriesRow {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) alt_title: Option<String>,
    pub(crate) description: String,
    pub(crate) status: String,
    pub(crate) rating: f64,
    pub(crate) author: String,
    pub(crate) artist: Option<String>,
    pub(crate) year: Option<i64>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}
impl SeriesRow {
    pub(crate) fn into_series(self, genres: BTreeSet<String>) -> Result<Series, Error> {
        Ok(Series {
            id: self.id,
            title: self.title,
            alt_title: self.alt_title,
            description: self.description,
            status: self.status.parse::<SeriesStatus>().or_raise(|| ErrorKind::InvalidData("series status"))?,
            rating: self.rating,
            author: self.author,
            artist: self.artist,
            year: self
                .year
                .map(u16::try_from)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("publication year"))?,
            genres,
            created_at: timestamp(self.created_at, "series creation date")?,
            updated_at: timestamp(self.updated_at, "series update date")?,
        })
    }
}
