//! SQLite catalog for series, chapters and pages.
//!
//! The catalog is the authoritative record of what exists: page image files
//! on disk are derived from it, never the other way around. Two repositories
//! share one connection pool:
//! - [`SeriesRepository`]: series metadata and genres.
//! - [`ChapterRepository`]: chapters and their pages, including the page
//!   numbering and page count invariants (every chapter's pages are numbered
//!   `1..=page_count` with no gaps).

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::{ChapterRepository, DeletedPage, Renumbered, SeriesRepository};
