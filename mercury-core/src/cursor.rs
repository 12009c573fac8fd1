use crate::{Executor, Result, ResultSet, RowLabeled, RowNames, RowsAffected, Statement};

/// Conventional cursor contract (`execute`, `fetchone`, `fetchmany`, `fetchall`)
/// over any [`Executor`].
///
/// `execute` runs eagerly: when it returns, the whole result set is resolved and
/// owned by the cursor. The fetch methods only read it.
#[derive(Debug)]
pub struct ProxyCursor<E: Executor> {
    executor: E,
    result: Option<ResultSet>,
    position: usize,
}

impl<E: Executor> ProxyCursor<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            result: None,
            position: 0,
        }
    }

    /// Run a statement, replacing the result of the previous one.
    pub fn execute(&mut self, statement: impl Into<Statement>) -> Result<&mut Self> {
        self.result = None;
        self.position = 0;
        self.result = Some(self.executor.run(statement.into())?);
        Ok(self)
    }

    /// Next row, `None` once all rows were fetched or when nothing was executed.
    pub fn fetchone(&mut self) -> Option<&RowLabeled> {
        let row = self.result.as_ref()?.rows.get(self.position)?;
        self.position += 1;
        Some(row)
    }

    /// Up to `size` of the rows following the current position.
    pub fn fetchmany(&mut self, size: usize) -> &[RowLabeled] {
        let Some(result) = self.result.as_ref() else {
            return &[];
        };
        let start = self.position.min(result.rows.len());
        let end = start.saturating_add(size).min(result.rows.len());
        self.position = end;
        &result.rows[start..end]
    }

    /// Every row of the last executed statement, independently of what was
    /// already fetched. Calling it again returns the same rows.
    pub fn fetchall(&self) -> &[RowLabeled] {
        self.result.as_ref().map_or(&[], |v| v.rows.as_slice())
    }

    pub fn rows_affected(&self) -> RowsAffected {
        self.result
            .as_ref()
            .map(|v| v.affected)
            .unwrap_or_default()
    }

    pub fn labels(&self) -> Option<&RowNames> {
        self.result.as_ref().map(|v| &v.labels)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.executor.commit()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_inner(self) -> E {
        self.executor
    }
}
