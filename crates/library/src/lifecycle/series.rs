use super::Lifecycle;
use crate::cleanup::Cleanup;
use crate::error::{CatalogResultExt, Result, not_found};
use crate::validate;
use tankobon_models::{NewSeries, Series, SeriesFilter, SeriesId, SeriesList};
use tracing::instrument;

impl Lifecycle {
    /// Validate and insert a series. No files are created until its first
    /// chapter is.
    #[instrument(skip(self, series), fields(title = %series.title))]
    pub async fn create_series(&self, series: &NewSeries) -> Result<Series> {
        let series = validate::series(series)?;
        let id = self.series.create_series(&series, self.clock.now()).await.or_catalog()?;
        tracing::info!(series_id = id, "Created series");
        self.get_series(id).await
    }

    pub async fn get_series(&self, id: SeriesId) -> Result<Series> {
        self.series
            .get_series(id)
            .await
            .or_catalog()?
            .ok_or_else(|| not_found(format!("series {id}")))
    }

    /// One page of the series matching `filter`.
    pub async fn list_series(&self, filter: &SeriesFilter) -> Result<SeriesList> {
        let filter = validate::series_filter(filter)?;
        self.series.list_series(&filter).await.or_catalog()
    }

    /// Every genre in use, alphabetically.
    pub async fn list_genres(&self) -> Result<Vec<String>> {
        self.series.list_genres().await.or_catalog()
    }

    /// Replace every attribute of a series, genres included.
    #[instrument(skip(self, series))]
    pub async fn update_series(&self, id: SeriesId, series: &NewSeries) -> Result<Series> {
        let series = validate::series(series)?;
        self.series.update_series(id, &series, self.clock.now()).await.or_catalog()?;
        tracing::info!(series_id = id, "Updated series");
        self.get_series(id).await
    }

    /// Delete a series with its chapters and pages.
    ///
    /// Rows go first (cascading to chapters and pages); the `series_<id>`
    /// directory is removed afterwards on a best-effort basis.
    #[instrument(skip(self))]
    pub async fn delete_series(&self, id: SeriesId) -> Result<()> {
        self.series.delete_series(id).await.or_catalog()?;
        Cleanup::SeriesDirectory { series_id: id }.run(&self.pages).await;
        tracing::info!(series_id = id, "Deleted series");
        Ok(())
    }
}
