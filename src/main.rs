mod cli;
mod commands;
mod error;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use tankobon_catalog::Database;
use tankobon_config::{Config, LogConfig};
use tankobon_library::{Lifecycle, Limits};
use tankobon_storage::backend::{LocalBackend, ReadOnlyBackend};
use tankobon_storage::{BackendHandle, PageStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    tracing_subscriber::registry()
        .with(filter)
        .with(log.json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!log.json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Open the catalog and the images root as configured.
async fn open(config: &Config) -> Result<(Database, Lifecycle)> {
    if let Some(parent) = config.database.path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Setup)?;
    }
    let db = Database::connect(&config.database.path).await.or_raise(|| ErrorKind::Setup)?;

    let root = config.images_root().or_raise(|| ErrorKind::Config)?;
    if !config.storage.read_only {
        tokio::fs::create_dir_all(&root).await.or_raise(|| ErrorKind::Setup)?;
    }
    let local: BackendHandle = Arc::new(LocalBackend::new("images", &root).or_raise(|| ErrorKind::Setup)?);
    let backend: BackendHandle = match config.storage.read_only {
        true => Arc::new(ReadOnlyBackend::new(local)),
        false => local,
    };
    tracing::debug!(database = %config.database.path.display(), images = %root.display(), read_only = config.storage.read_only, "Opened catalog");

    let lifecycle = Lifecycle::new(PageStore::new(backend), &db).with_limits(Limits {
        max_image_size: config.uploads.max_image_size,
    });
    Ok((db, lifecycle))
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let (db, lifecycle) = open(&config).await?;
    let result = commands::run(&lifecycle, cli.command).await;
    db.close().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());
    match &config {
        Ok(config) => init_logging(&config.log),
        Err(_) => init_logging(&LogConfig::default()),
    }
    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(err) => Err(err.raise(ErrorKind::Config)),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "{err}");
            ExitCode::from(err.exit_code())
        },
    }
}
