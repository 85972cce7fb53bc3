use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use std::path::PathBuf;
use tankobon_models::Page;

#[derive(sqlx::FromRow)]
pub(crate) struct PageRow {
    pub(crate) id: i64,
    pub(crate) chapter_id: i64,
    pub(crate) number: i64,
    pub(crate) image_path: String,
}
impl TryFrom<PageRow> for Page {
    type Error = Error;
    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(Page {
            id: row.id,
            chapter_id: row.chapter_id,
            number: u32::try_from(row.number).or_raise(|| ErrorKind::InvalidData("page number"))?,
            image_path: PathBuf::from(row.image_path),
        })
    }
}
