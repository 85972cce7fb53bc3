//! Library Error Types
//!
//! The four categories a caller acts on (reject the input, report a missing
//! entity, report a conflict, report a server-side failure), plus a separate
//! server-side category for the catalog database. Errors from the page store
//! and the catalog are kept as child frames of the error tree, so logs retain
//! which step failed while the top-level kind stays actionable.

use derive_more::{Display, Error};
use tankobon_catalog::error::{Error as CatalogError, ErrorKind as CatalogErrorKind};
use tankobon_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Malformed input, rejected before any side effect.
    #[display("invalid input: {_0}")]
    Validation(#[error(not(source))] String),
    /// Referenced series, chapter or page does not exist.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Duplicate chapter number within a series, or page number within a chapter.
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Filesystem failure. Never displays paths; they live in the child frame.
    #[display("image storage failure")]
    Storage { retryable: bool },
    /// Catalog database failure that is neither "not found" nor a conflict.
    #[display("catalog failure")]
    Catalog { retryable: bool },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_) => false,
            Self::Storage { retryable } | Self::Catalog { retryable } => *retryable,
        }
    }

    /// Whether the failure is the caller's to fix (4xx-class).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_))
    }
}

impl From<&CatalogErrorKind> for ErrorKind {
    fn from(kind: &CatalogErrorKind) -> Self {
        match kind {
            CatalogErrorKind::NotFound(what) => Self::NotFound(what.clone()),
            CatalogErrorKind::Conflict(what) => Self::Conflict(what.clone()),
            other => Self::Catalog {
                retryable: other.is_retryable(),
            },
        }
    }
}

impl From<&StorageErrorKind> for ErrorKind {
    fn from(kind: &StorageErrorKind) -> Self {
        Self::Storage {
            retryable: kind.is_retryable(),
        }
    }
}

/// Raise a catalog error into the matching library [`ErrorKind`].
pub(crate) trait CatalogResultExt<T> {
    fn or_catalog(self) -> Result<T>;
}
impl<T> CatalogResultExt<T> for std::result::Result<T, CatalogError> {
    #[track_caller]
    fn or_catalog(self) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let kind = ErrorKind::from(&*err);
                Err(err.raise(kind))
            },
        }
    }
}

/// Raise a page store error as [`ErrorKind::Storage`].
pub(crate) trait StorageResultExt<T> {
    fn or_storage(self) -> Result<T>;
}
impl<T> StorageResultExt<T> for std::result::Result<T, StorageError> {
    #[track_caller]
    fn or_storage(self) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let kind = ErrorKind::from(&*err);
                Err(err.raise(kind))
            },
        }
    }
}

pub(crate) fn validation(reason: impl Into<String>) -> Error {
    exn::Exn::from(ErrorKind::Validation(reason.into()))
}

pub(crate) fn not_found(what: impl Into<String>) -> Error {
    exn::Exn::from(ErrorKind::NotFound(what.into()))
}
