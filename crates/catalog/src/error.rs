//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Constraint violations reported by SQLite are
//! classified into [`ErrorKind::Conflict`] and [`ErrorKind::NotFound`] so
//! callers never have to inspect driver errors.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// Referenced row does not exist (including foreign key violations).
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Uniqueness constraint violated.
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Stored or supplied data can't be represented.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Classify a driver error, describing the affected entity with `what`
    /// for the not-found and conflict cases.
    pub(crate) fn classify(err: &sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(what()),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => Self::NotFound(what()),
            _ => Self::Database,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}

/// Raise a driver error as its classified [`ErrorKind`], keeping the driver
/// error as the child frame.
pub(crate) trait ClassifyExt<T> {
    fn or_classify(self, what: impl FnOnce() -> String) -> Result<T>;
}
impl<T> ClassifyExt<T> for std::result::Result<T, sqlx::Error> {
    #[track_caller]
    fn or_classify(self, what: impl FnOnce() -> String) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let kind = ErrorKind::classify(&err, what);
                Err(exn::Exn::from(err).raise(kind))
            },
        }
    }
}
