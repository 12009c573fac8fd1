use crate::{Connection, Result, SqlWriter};

/// Entry point of a backend.
///
/// A driver is a small value passed explicitly wherever connections are
/// opened (dispatcher worker, pool), there is no process wide "current"
/// driver. It must be cheap to clone and shareable across threads, the
/// connections it opens need not be.
pub trait Driver: Clone + Send + Sync + 'static {
    type Connection: Connection<Driver = Self>;
    type SqlWriter: SqlWriter;

    /// Name of the backend, also the expected URL scheme.
    const NAME: &'static str;

    /// Open a new physical connection on the calling thread.
    fn connect(&self, url: &str) -> Result<Self::Connection>;

    fn sql_writer(&self) -> Self::SqlWriter;
}
