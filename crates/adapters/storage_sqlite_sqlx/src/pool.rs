//! `SQLite` connection pool setup and database discovery.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StorageError;

/// How long a query waits for the host to release a write lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_SETTINGS: &str =
    "CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT)";

/// Configuration for the `SQLite` storage adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:/home/user/.mozilla-iot/config/db.sqlite3`
    /// or `sqlite::memory:`).
    pub database_url: String,
    /// Create the `settings` table when missing. The host owns the schema, so
    /// this is only meant for tests and standalone runs.
    pub create_schema: bool,
}

impl Config {
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            create_schema: false,
        }
    }

    /// Point at a database file on disk.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self::new(format!("sqlite:{}", path.display()))
    }

    #[must_use]
    pub fn with_schema(mut self) -> Self {
        self.create_schema = true;
        self
    }

    /// Locate the host database from `MOZIOT_DATABASE`, then from the
    /// `config/db.sqlite3` file under `MOZIOT_HOME`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathUnknown`] when neither variable leads to
    /// an existing path.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::discover(Self::candidates(|name| std::env::var_os(name)))
    }

    /// Candidate database files derived from the environment, in lookup order.
    /// `MOZIOT_HOME` names the gateway profile directory, not the file.
    pub fn candidates(lookup: impl Fn(&str) -> Option<OsString>) -> Vec<PathBuf> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let database = non_empty("MOZIOT_DATABASE").map(PathBuf::from);
        let home = non_empty("MOZIOT_HOME")
            .map(|home| PathBuf::from(home).join("config").join("db.sqlite3"));
        database.into_iter().chain(home).collect()
    }

    /// Pick the first candidate path that exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathUnknown`] when no candidate exists.
    pub fn discover(candidates: impl IntoIterator<Item = PathBuf>) -> Result<Self, StorageError> {
        candidates
            .into_iter()
            .find(|path| path.exists())
            .map(|path| {
                tracing::debug!(path = %path.display(), "settings database found");
                Self::from_path(&path)
            })
            .ok_or(StorageError::PathUnknown)
    }

    /// Build a [`Database`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or schema creation fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::initialize(&self).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn initialize(config: &Config) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(config.create_schema);

        // every connection to `:memory:` opens a distinct database
        let max_connections = if config.database_url.contains(":memory:") {
            1
        } else {
            4
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        if config.create_schema {
            sqlx::query(CREATE_SETTINGS).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
