use crate::{Driver, ProxyCursor, Result, ResultSet, RowLabeled, RowsAffected, Statement};

/// Anything able to run a statement synchronously and hand back its result.
///
/// Implemented by driver connections, by the [`Dispatcher`](crate::Dispatcher)
/// (submit and wait) and by pool entries. Upper layers are written against this
/// trait and never learn which ownership model is in effect.
pub trait Executor {
    type Driver: Driver;

    fn driver(&self) -> &Self::Driver;

    /// Run one statement and collect everything it produced.
    fn run(&mut self, statement: Statement) -> Result<ResultSet>;

    /// Make the changes done so far durable. A no-op when no transaction is open.
    fn commit(&mut self) -> Result<()>;

    /// Execute the query and returns the rows.
    fn fetch(&mut self, statement: impl Into<Statement>) -> Result<Vec<RowLabeled>>
    where
        Self: Sized,
    {
        self.run(statement.into()).map(|v| v.rows)
    }

    /// Execute the query and return the total number of rows affected.
    fn execute(&mut self, statement: impl Into<Statement>) -> Result<RowsAffected>
    where
        Self: Sized,
    {
        self.run(statement.into()).map(|v| v.affected)
    }

    /// Borrow this executor behind the conventional cursor contract.
    fn cursor(&mut self) -> ProxyCursor<&mut Self>
    where
        Self: Sized,
    {
        ProxyCursor::new(self)
    }
}

impl<E: Executor> Executor for &mut E {
    type Driver = E::Driver;

    fn driver(&self) -> &Self::Driver {
        (**self).driver()
    }

    fn run(&mut self, statement: Statement) -> Result<ResultSet> {
        (**self).run(statement)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }
}
