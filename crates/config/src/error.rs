use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A provider failed, or the merged values don't fit [`Config`](crate::Config).
    #[display("could not load configuration")]
    Load,
    #[display("configuration file not found: {}", _0.display())]
    MissingFile(#[error(not(source))] PathBuf),
    #[display("unsupported configuration file format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}
