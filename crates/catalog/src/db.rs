//! Catalog database handle.
//!
//! The schema relies on SQLite enforcing foreign keys: deleting a series or a
//! chapter cascades to everything below it. Every pooled connection is opened
//! with that enforcement on.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Statements run on each new connection, after the connect options.
const CONNECTION_PRAGMAS: &[&str] = &[
    "PRAGMA wal_autocheckpoint = 800",
    "PRAGMA cache_size = -8192",
    "PRAGMA temp_store = MEMORY",
];

/// Where the catalog lives.
#[derive(Debug, Clone, Copy)]
enum Location<'a> {
    File(&'a Path),
    /// Private to a single connection.
    Memory,
}

impl Location<'_> {
    fn options(self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(1500));
        match self {
            Self::File(path) => options.filename(path).create_if_missing(true),
            Self::Memory => options.filename(":memory:"),
        }
    }

    fn max_connections(self) -> u32 {
        match self {
            Self::File(_) => 5,
            Self::Memory => 1,
        }
    }
}

/// Connection pool over the catalog, migrated to the current schema.
///
/// Repositories are built from it with `From<&Database>`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the catalog file at `path`. The parent
    /// directory must exist.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Location::File(path.as_ref())).await
    }

    /// A fresh catalog that disappears with its connection. Available outside
    /// `cfg(test)` for the tests of dependent crates.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Location::Memory).await
    }

    #[instrument(skip_all, fields(location = ?location))]
    async fn open(location: Location<'_>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(location.max_connections())
            .after_connect(|conn, _meta| Box::pin(async move { Self::prepare(conn).await }))
            .connect_with(location.options())
            .await
            .or_raise(|| ErrorKind::Database)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        tracing::debug!("Catalog ready");
        Ok(Self { pool })
    }

    async fn prepare(conn: &mut SqliteConnection) -> sqlx::Result<()> {
        for pragma in CONNECTION_PRAGMAS {
            sqlx::query(*pragma).execute(&mut *conn).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refresh planner statistics, then wait for connections to be returned
    /// and close them.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
