use crate::error::{Error, ErrorKind};
use crate::models::timestamp;
use exn::ResultExt;
use tankobon_models::{Chapter, ChapterNumber};

#[derive(sqlx::FromRow)]
pub(crate) struct ChapterRow {
    pub(crate) id: i64,
    pub(crate) series_id: i64,
    /// Hundredths of a chapter
    pub(crate) number: i64,
    pub(crate) title: String,
    pub(crate) page_count: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}
impl TryFrom<ChapterRow> for Chapter {
    type Error = Error;
    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        let hundredths = u32::try_from(row.number).or_raise(|| ErrorKind::InvalidData("chapter number"))?;
        Ok(Chapter {
            id: row.id,
            series_id: row.series_id,
            number: ChapterNumber::from_hundredths(hundredths).or_raise(|| ErrorKind::InvalidData("chapter number"))?,
            title: row.title,
            page_count: u32::try_from(row.page_count).or_raise(|| ErrorKind::InvalidData("page count"))?,
            created_at: timestamp(row.created_at, "chapter creation date")?,
            updated_at: timestamp(row.updated_at, "chapter update date")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(number: i64, page_count: i64) -> ChapterRow {
        ChapterRow {
            id: 1,
            series_id: 1,
            number,
            title: "Pilot".to_string(),
            page_count,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_row_to_model() {
        let chapter = Chapter::try_from(row(450, 12)).unwrap();
        assert_eq!(chapter.number.to_string(), "4.50");
        assert_eq!(chapter.page_count, 12);
    }

    #[rstest]
    #[case(row(0, 1), "chapter number")]
    #[case(row(-100, 1), "chapter number")]
    #[case(row(100, -1), "page count")]
    fn test_invalid_rows(#[case] row: ChapterRow, #[case] field: &'static str) {
        let err = Chapter::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData(f) if *f == field));
    }
}
