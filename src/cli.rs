use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tankobon_models::{ChapterId, ChapterNumber, DEFAULT_PAGE_SIZE, PageId, SeriesId, SeriesSort, SeriesStatus};

/// Administrative tooling for the tankobon catalog.
#[derive(Parser)]
#[command(name = "tankobon", version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short, global = true, env = "TANKOBON_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage series.
    #[command(subcommand)]
    Series(SeriesCommand),
    /// Manage chapters of a series.
    #[command(subcommand)]
    Chapter(ChapterCommand),
    /// Manage pages of a chapter.
    #[command(subcommand)]
    Page(PageCommand),
}

#[derive(Subcommand)]
pub enum SeriesCommand {
    /// Create a series.
    Create(SeriesArgs),
    /// List series, optionally filtered, sorted and paged.
    List(ListArgs),
    /// List every genre in use.
    Genres,
    /// Show a series with its chapters.
    Show { id: SeriesId },
    /// Delete a series, its chapters, pages and images.
    Delete { id: SeriesId },
}

#[derive(Args)]
pub struct SeriesArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub author: String,
    #[arg(long)]
    pub alt_title: Option<String>,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, value_parser = parse_status, default_value = "ongoing")]
    pub status: SeriesStatus,
    #[arg(long, default_value_t = 0.0)]
    pub rating: f64,
    #[arg(long)]
    pub artist: Option<String>,
    #[arg(long)]
    pub year: Option<u16>,
    /// May be repeated.
    #[arg(long = "genre")]
    pub genres: Vec<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only series with this genre.
    #[arg(long)]
    pub genre: Option<String>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<SeriesStatus>,
    /// Substring of the title or alternative title.
    #[arg(long)]
    pub search: Option<String>,
    /// One of title, rating, created (or date), updated.
    #[arg(long, value_parser = parse_sort, default_value = "title")]
    pub sort: SeriesSort,
    #[arg(long)]
    pub desc: bool,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

#[derive(Subcommand)]
pub enum ChapterCommand {
    /// Create an empty chapter.
    Create {
        #[arg(long)]
        series: SeriesId,
        #[arg(long, value_parser = parse_number)]
        number: ChapterNumber,
        #[arg(long)]
        title: String,
    },
    /// List the chapters of a series.
    List {
        #[arg(long)]
        series: SeriesId,
    },
    /// Change the number and/or title of a chapter.
    Rename {
        id: ChapterId,
        #[arg(long, value_parser = parse_number)]
        number: Option<ChapterNumber>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a chapter with its pages and images.
    Delete { id: ChapterId },
}

#[derive(Subcommand)]
pub enum PageCommand {
    /// Upload an image as a page; appends unless a number is given.
    Add {
        #[arg(long)]
        chapter: ChapterId,
        #[arg(long)]
        number: Option<u32>,
        image: PathBuf,
    },
    /// List the pages of a chapter.
    List {
        #[arg(long)]
        chapter: ChapterId,
    },
    /// Show a page and its image type; optionally save the image.
    Show {
        id: PageId,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a page; later pages move down by one.
    Delete { id: PageId },
    /// Rename page images still named after an old page number.
    Realign {
        #[arg(long)]
        chapter: ChapterId,
    },
}

fn parse_number(value: &str) -> Result<ChapterNumber, String> {
    value.parse().map_err(|err: tankobon_models::error::Error| err.to_string())
}

fn parse_sort(value: &str) -> Result<SeriesSort, String> {
    value.parse().map_err(|err: tankobon_models::error::Error| err.to_string())
}

fn parse_status(value: &str) -> Result<SeriesStatus, String> {
    value.parse().map_err(|err: tankobon_models::error::Error| err.to_string())
}
