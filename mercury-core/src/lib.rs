mod as_value;
mod connection;
mod cursor;
mod dispatcher;
mod driver;
mod error;
mod executor;
mod pool;
mod query;
mod response;
mod sql_writer;
mod statement;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use connection::*;
pub use cursor::*;
pub use dispatcher::*;
pub use driver::*;
pub use error::*;
pub use executor::*;
pub use pool::*;
pub use query::*;
pub use response::*;
pub use sql_writer::*;
pub use statement::*;
pub use util::*;
pub use value::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
