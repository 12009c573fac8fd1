use crate::{SqliteConnection, SqliteSqlWriter};
use mercury_core::{Driver, Result};
use std::time::Duration;

/// SQLite backend, connection URLs look like `sqlite://path/to/file.sqlite?mode=rwc`.
///
/// Everything after the scheme is passed to SQLite as a `file:` URI, so the
/// usual URI parameters (`mode`, `cache`, `vfs`, ...) are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteDriver {
    pub(crate) busy_timeout: Duration,
}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// How long a statement waits for a lock held by another connection
    /// before failing.
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;
    type SqlWriter = SqliteSqlWriter;

    const NAME: &'static str = "sqlite";

    fn connect(&self, url: &str) -> Result<SqliteConnection> {
        SqliteConnection::connect(*self, url)
    }

    fn sql_writer(&self) -> SqliteSqlWriter {
        SqliteSqlWriter {}
    }
}
