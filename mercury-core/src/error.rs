use std::thread::ThreadId;
use thiserror::Error;

/// Failure categories raised by the dispatcher and the pool.
///
/// They travel inside [`crate::Error`], either as the error itself or as
/// context attached to a driver error, so callers match on them with
/// `error.downcast_ref::<ErrorKind>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A statement failed inside the driver. The driver error is the source.
    #[error("Error while executing the statement:\n{0}")]
    Execution(String),
    #[error("The dispatcher is closed and does not accept commands")]
    DispatcherClosed,
    #[error("The dispatcher worker is gone, the command was never resolved")]
    WorkerGone,
    #[error("The dispatcher worker panicked while executing the command: {0}")]
    WorkerPanic(String),
    #[error("Timed out while waiting for the response")]
    Timeout,
    #[error(
        "The connection pool was destroyed with {0} live connection(s), they were closed automatically"
    )]
    TeardownWithLiveEntries(usize),
    #[error(
        "Connection {entry} was opened by thread {owner:?} but is being closed by thread {closer:?}"
    )]
    ThreadLifecycleHazard {
        entry: u64,
        owner: ThreadId,
        closer: ThreadId,
    },
    #[error("Pool connection {0} is already closed")]
    EntryClosed(u64),
    #[error("The connection pool reached its limit of {0} connection(s)")]
    PoolExhausted(usize),
}

impl ErrorKind {
    /// Find the kind carried by an error chain, if any.
    pub fn of(error: &crate::Error) -> Option<&ErrorKind> {
        error.downcast_ref::<ErrorKind>()
    }
}
