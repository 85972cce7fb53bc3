//! Subcommand handlers. Results are printed to stdout as JSON; logs go to
//! stderr.

use crate::cli::{ChapterCommand, Command, ListArgs, PageCommand, SeriesArgs, SeriesCommand};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use std::io::Write;
use tankobon_library::Lifecycle;
use tankobon_library::error::Error as LibraryError;
use tankobon_models::{ImageFormat, NewChapter, NewSeries, SeriesFilter};

/// Raise a library error as the command failure matching its category.
trait CommandResultExt<T> {
    fn or_command(self) -> Result<T>;
}
impl<T> CommandResultExt<T> for std::result::Result<T, LibraryError> {
    #[track_caller]
    fn or_command(self) -> Result<T> {
        self.map_err(|err| {
            let kind = if err.is_client_error() {
                ErrorKind::Rejected
            } else if err.is_retryable() {
                ErrorKind::Unavailable
            } else {
                ErrorKind::Command
            };
            err.raise(kind)
        })
    }
}

fn print(value: &impl Serialize) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).or_raise(|| ErrorKind::Output)?;
    writeln!(stdout).or_raise(|| ErrorKind::Output)
}

impl From<SeriesArgs> for NewSeries {
    fn from(args: SeriesArgs) -> Self {
        NewSeries {
            title: args.title,
            alt_title: args.alt_title,
            description: args.description,
            status: args.status,
            rating: args.rating,
            author: args.author,
            artist: args.artist,
            year: args.year,
            genres: args.genres.into_iter().collect(),
        }
    }
}

impl From<ListArgs> for SeriesFilter {
    fn from(args: ListArgs) -> Self {
        SeriesFilter {
            genre: args.genre,
            status: args.status,
            search: args.search,
            sort: args.sort,
            descending: args.desc,
            page: args.page,
            page_size: args.page_size,
        }
    }
}

pub async fn run(lifecycle: &Lifecycle, command: Command) -> Result<()> {
    match command {
        Command::Series(command) => series(lifecycle, command).await,
        Command::Chapter(command) => chapter(lifecycle, command).await,
        Command::Page(command) => page(lifecycle, command).await,
    }
}

async fn series(lifecycle: &Lifecycle, command: SeriesCommand) -> Result<()> {
    match command {
        SeriesCommand::Create(args) => {
            let series = lifecycle.create_series(&args.into()).await.or_command()?;
            print(&series)
        },
        SeriesCommand::List(args) => print(&lifecycle.list_series(&args.into()).await.or_command()?),
        SeriesCommand::Genres => print(&lifecycle.list_genres().await.or_command()?),
        SeriesCommand::Show { id } => {
            let series = lifecycle.get_series(id).await.or_command()?;
            let chapters = lifecycle.list_chapters(id).await.or_command()?;
            print(&serde_json::json!({ "series": series, "chapters": chapters }))
        },
        SeriesCommand::Delete { id } => lifecycle.delete_series(id).await.or_command(),
    }
}

async fn chapter(lifecycle: &Lifecycle, command: ChapterCommand) -> Result<()> {
    match command {
        ChapterCommand::Create { series, number, title } => {
            let chapter = lifecycle
                .create_chapter(&NewChapter::new(series, number, title))
                .await
                .or_command()?;
            print(&chapter)
        },
        ChapterCommand::List { series } => print(&lifecycle.list_chapters(series).await.or_command()?),
        ChapterCommand::Rename { id, number, title } => {
            let current = lifecycle.get_chapter(id).await.or_command()?;
            let number = number.unwrap_or(current.number);
            let title = title.unwrap_or(current.title);
            let chapter = lifecycle.update_chapter(id, number, &title).await.or_command()?;
            print(&chapter)
        },
        ChapterCommand::Delete { id } => print(&lifecycle.delete_chapter(id).await.or_command()?),
    }
}

async fn page(lifecycle: &Lifecycle, command: PageCommand) -> Result<()> {
    match command {
        PageCommand::Add { chapter, number, image } => {
            let bytes = tokio::fs::read(&image)
                .await
                .or_raise(|| ErrorKind::Input(image.display().to_string()))?;
            let page = lifecycle.add_page(chapter, number, &bytes).await.or_command()?;
            print(&page)
        },
        PageCommand::List { chapter } => print(&lifecycle.list_pages(chapter).await.or_command()?),
        PageCommand::Show { id, output } => {
            let (page, bytes) = lifecycle.read_page(id).await.or_command()?;
            if let Some(output) = &output {
                tokio::fs::write(output, &bytes).await.or_raise(|| ErrorKind::Output)?;
            }
            let mime_type = ImageFormat::from_magic_bytes(&bytes).map(|format| format.mime_type());
            print(&serde_json::json!({ "page": page, "mime_type": mime_type, "size": bytes.len() }))
        },
        PageCommand::Delete { id } => print(&lifecycle.delete_page(id).await.or_command()?),
        PageCommand::Realign { chapter } => {
            let realignment = lifecycle.realign_pages(chapter).await.or_command()?;
            print(&serde_json::json!({ "moved": realignment.moved, "remaining": realignment.remaining }))
        },
    }
}
