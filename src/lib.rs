//! Mercury hands many threads one database.
//!
//! Two ownership models are available for drivers whose connections cannot be
//! freely shared:
//! - [`Dispatcher`]: one worker thread owns the connection, every caller
//!   submits statements to a FIFO queue and waits on a [`ResponseSink`].
//! - [`ConnectionPool`]: every caller thread gets a connection of its own,
//!   closed on that thread when it terminates.
//!
//! Both implement [`Executor`], so upper layers use the same [`ProxyCursor`]
//! contract regardless of the model in effect.
pub use mercury_core::*;
