//! Repository for series and their genres.

use crate::Database;
use crate::error::{ClassifyExt, ErrorKind, Result};
use crate::models::SeriesRow;
use exn::ResultExt;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeSet;
use tankobon_models::{NewSeries, Series, SeriesFilter, SeriesId, SeriesList};
use time::UtcDateTime;

/// Repository for [`Series`] records.
///
/// Deleting a series cascades (through foreign keys) to its genres, chapters
/// and pages. Files on disk are not this repository's concern.
#[derive(Debug, Clone)]
pub struct SeriesRepository {
    pool: SqlitePool,
}
impl From<&Database> for SeriesRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl SeriesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_genres(tx: &mut Transaction<'_, Sqlite>, id: SeriesId, genres: &BTreeSet<String>) -> Result<()> {
        for genre in genres {
            sqlx::query(include_str!("../../queries/insert_series_genre.sql"))
                .bind(id)
                .bind(genre)
                .execute(&mut **tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    /// Insert a series and its genres in one transaction.
    pub async fn create_series(&self, series: &NewSeries, now: UtcDateTime) -> Result<SeriesId> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let id: SeriesId = sqlx::query_scalar(include_str!("../../queries/insert_series.sql"))
            .bind(&series.title)
            .bind(&series.alt_title)
            .bind(&series.description)
            .bind(series.status.as_str())
            .bind(series.rating)
            .bind(&series.author)
            .bind(&series.artist)
            .bind(series.year.map(i64::from))
            .bind(now.unix_timestamp())
            .fetch_one(&mut *tx)
            .await
            .or_classify(|| format!("series \"{}\"", series.title))?;
        Self::insert_genres(&mut tx, id, &series.genres).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(series_id = id, "Inserted series");
        Ok(id)
    }

    pub async fn get_series(&self, id: SeriesId) -> Result<Option<Series>> {
        let row: Option<SeriesRow> = sqlx::query_as(include_str!("../../queries/get_series.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let genres = self.genres_of(id).await?;
        Ok(Some(row.into_series(genres)?))
    }

    /// Existence check used before inserting chapters.
    pub async fn series_exists(&self, id: SeriesId) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(include_str!("../../queries/series_exists.sql"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(exists != 0)
    }

    async fn genres_of(&self, id: SeriesId) -> Result<BTreeSet<String>> {
        let genres: Vec<String> = sqlx::query_scalar(include_str!("../../queries/list_series_genres.sql"))
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(genres.into_iter().collect())
    }

    /// One page of the series matching `filter`, plus the total number of matches.
    ///
    /// The search term matches title and alternative title as a
    /// case-insensitive substring; `%` and `_` in it are taken literally.
    pub async fn list_series(&self, filter: &SeriesFilter) -> Result<SeriesList> {
        let status = filter.status.map(|status| status.as_str());
        let pattern = filter.search.as_deref().map(like_pattern);
        let total: i64 = sqlx::query_scalar(include_str!("../../queries/count_series.sql"))
            .bind(&filter.genre)
            .bind(status)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let rows: Vec<SeriesRow> = sqlx::query_as(include_str!("../../queries/list_series.sql"))
            .bind(&filter.genre)
            .bind(status)
            .bind(&pattern)
            .bind(filter.sort.as_str())
            .bind(filter.descending)
            .bind(i64::from(filter.page_size))
            .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut series = Vec::with_capacity(rows.len());
        for row in rows {
            let genres = self.genres_of(row.id).await?;
            series.push(row.into_series(genres)?);
        }
        Ok(SeriesList {
            series,
            total: u64::try_from(total).unwrap_or_default(),
            page: filter.page,
            page_size: filter.page_size,
        })
    }

    /// Every genre used by at least one series, alphabetically.
    pub async fn list_genres(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../../queries/list_genres.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Replace all attributes (and the genre set) of a series.
    ///
    /// Returns [`ErrorKind::NotFound`] if no series has that id.
    pub async fn update_series(&self, id: SeriesId, series: &NewSeries, now: UtcDateTime) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let result = sqlx::query(include_str!("../../queries/update_series.sql"))
            .bind(id)
            .bind(&series.title)
            .bind(&series.alt_title)
            .bind(&series.description)
            .bind(series.status.as_str())
            .bind(series.rating)
            .bind(&series.author)
            .bind(&series.artist)
            .bind(series.year.map(i64::from))
            .bind(now.unix_timestamp())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(format!("series {id}")));
        }
        sqlx::query(include_str!("../../queries/delete_series_genres.sql"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::insert_genres(&mut tx, id, &series.genres).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Delete a series; chapters, pages and genres go with it.
    ///
    /// Returns [`ErrorKind::NotFound`] if no series has that id.
    pub async fn delete_series(&self, id: SeriesId) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/delete_series.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(format!("series {id}")));
        }
        tracing::debug!(series_id = id, "Deleted series");
        Ok(())
    }
}

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
