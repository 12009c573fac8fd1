use crate::{Executor, Result};

/// A physical connection owned by exactly one place at a time: a caller, the
/// dispatcher worker, or a pool entry.
///
/// Implementations that are `Send` can be used by the [`ConnectionPool`](crate::ConnectionPool),
/// the others only through the [`Dispatcher`](crate::Dispatcher), which opens,
/// uses and closes them on its worker thread.
pub trait Connection: Executor {
    fn begin(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    /// Whether a transaction is open on this connection.
    fn in_transaction(&self) -> bool;
    /// Release the connection, reporting errors the driver raises while doing it.
    fn close(self) -> Result<()>;
}
