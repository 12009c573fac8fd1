use crate::{
    CBox, SqliteDriver, SqliteSqlWriter,
    bind::bind_params,
    error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI,
    SQLITE_ROW, sqlite3, sqlite3_busy_timeout, sqlite3_changes, sqlite3_close,
    sqlite3_column_count, sqlite3_errmsg, sqlite3_errstr, sqlite3_finalize,
    sqlite3_get_autocommit, sqlite3_last_insert_rowid, sqlite3_open_v2, sqlite3_prepare_v2,
    sqlite3_step, sqlite3_stmt, sqlite3_total_changes,
};
use mercury_core::{
    Connection, Context, Driver, Error, Executor, Result, ResultSet, RowLabeled, RowNames,
    RowsAffected, SqlWriter, Statement, truncate_long,
};
use std::{
    ffi::{CStr, CString, c_int},
    ptr,
};

// The bundled bindings of libsqlite3-sys omit this symbol, the bundled C library exports it.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    pub(crate) driver: SqliteDriver,
}

impl SqliteConnection {
    pub fn connect(driver: SqliteDriver, url: &str) -> Result<SqliteConnection> {
        let prefix = format!("{}://", SqliteDriver::NAME);
        if !url.starts_with(&prefix) {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                &prefix
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let context = || format!("Error while decoding connection URL: `{}`", url);
        let uri = CString::new(format!("file:{}", &url[prefix.len()..])).with_context(context)?;
        let mut connection = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close_v2(p);
        });
        unsafe {
            let rc = sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_URI | SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                let message = if connection.is_null() {
                    error_message_from_ptr(&sqlite3_errstr(rc)).to_string()
                } else {
                    error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string()
                };
                let error = Error::msg(message).context(format!("Could not open `{}`", url));
                log::error!("{:#}", error);
                return Err(error);
            }
            let timeout = driver.busy_timeout.as_millis().min(c_int::MAX as u128) as c_int;
            sqlite3_busy_timeout(*connection, timeout);
        }
        log::debug!("Opened sqlite connection to `{}`", url);
        Ok(Self { connection, driver })
    }

    fn prepare(&mut self, sql: &str) -> Result<CBox<*mut sqlite3_stmt>> {
        let context = || format!("While preparing the query:\n{}", truncate_long!(sql));
        let query = CString::new(sql)
            .map_err(|e| {
                Error::new(e).context("Could not create a CString from the query String")
            })
            .with_context(context)?;
        let mut statement = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_finalize(p);
        });
        unsafe {
            let mut tail = ptr::null();
            let rc = sqlite3_prepare_v2(
                *self.connection,
                query.as_ptr(),
                -1,
                &mut *statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                let error = Error::msg(
                    error_message_from_ptr(&sqlite3_errmsg(*self.connection)).to_string(),
                )
                .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            if !tail.is_null()
                && !CStr::from_ptr(tail)
                    .to_bytes()
                    .iter()
                    .all(|c| c.is_ascii_whitespace() || *c == b';')
            {
                let error = Error::msg("Cannot run more than one statement at a time")
                    .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(statement)
    }

    fn step_all(&mut self, statement: CBox<*mut sqlite3_stmt>) -> Result<ResultSet> {
        unsafe {
            let db = *self.connection;
            let changes_before = sqlite3_total_changes(db);
            let rowid_before = sqlite3_last_insert_rowid(db);
            let count = sqlite3_column_count(*statement);
            let labels = (0..count)
                .map(|i| extract_name(*statement, i))
                .collect::<Result<RowNames>>()?;
            let mut rows = Vec::new();
            loop {
                match sqlite3_step(*statement) {
                    SQLITE_DONE => break,
                    SQLITE_ROW => rows.push(RowLabeled::new(
                        labels.clone(),
                        (0..count)
                            .map(|i| extract_value(*statement, i))
                            .collect::<Result<_>>()?,
                    )),
                    _ => {
                        let error =
                            Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string());
                        log::error!("{:#}", error);
                        return Err(error);
                    }
                }
            }
            let mut affected = RowsAffected::default();
            if sqlite3_total_changes(db) != changes_before {
                affected.rows_affected = sqlite3_changes(db) as u64;
                let rowid = sqlite3_last_insert_rowid(db);
                if rowid != rowid_before {
                    affected.last_affected_id = Some(rowid);
                }
            }
            Ok(ResultSet::new(labels, rows, affected))
        }
    }

    fn run_transaction_statement(
        &mut self,
        write: fn(&SqliteSqlWriter, &mut String),
    ) -> Result<()> {
        let mut sql = String::new();
        write(&self.driver.sql_writer(), &mut sql);
        self.run(Statement::new(sql)).map(|_| ())
    }
}

impl Executor for SqliteConnection {
    type Driver = SqliteDriver;

    fn driver(&self) -> &SqliteDriver {
        &self.driver
    }

    fn run(&mut self, statement: Statement) -> Result<ResultSet> {
        let prepared = self.prepare(statement.sql())?;
        if prepared.is_null() {
            // Only whitespace or comments
            return Ok(ResultSet::default());
        }
        bind_params(*prepared, statement.params())?;
        self.step_all(prepared)
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.run_transaction_statement(SqlWriter::write_transaction_commit)
    }
}

impl Connection for SqliteConnection {
    fn begin(&mut self) -> Result<()> {
        self.run_transaction_statement(SqlWriter::write_transaction_begin)
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.run_transaction_statement(SqlWriter::write_transaction_rollback)
    }

    fn in_transaction(&self) -> bool {
        unsafe { sqlite3_get_autocommit(*self.connection) == 0 }
    }

    fn close(mut self) -> Result<()> {
        unsafe {
            let rc = sqlite3_close(*self.connection);
            if rc != SQLITE_OK {
                // Still owned, released by sqlite3_close_v2 on drop
                let error = Error::msg(
                    error_message_from_ptr(&sqlite3_errmsg(*self.connection)).to_string(),
                )
                .context("Could not close the sqlite connection");
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        self.connection.take();
        log::debug!("Closed sqlite connection");
        Ok(())
    }
}
