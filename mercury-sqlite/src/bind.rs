use crate::error_message_from_ptr;
use libsqlite3_sys::*;
use mercury_core::{Error, Result, Value, truncate_long};
use std::{
    ffi::{CStr, c_int},
    os::raw::{c_char, c_void},
};

/// Bind `params` to the positional parameters of `statement`, in order.
pub(crate) fn bind_params(statement: *mut sqlite3_stmt, params: &[Value]) -> Result<()> {
    unsafe {
        let expected = sqlite3_bind_parameter_count(statement) as usize;
        if expected != params.len() {
            let error = Error::msg(format!(
                "The query expects {} parameter(s) but {} were provided:\n{}",
                expected,
                params.len(),
                truncate_long!(CStr::from_ptr(sqlite3_sql(statement)).to_string_lossy())
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        for (i, value) in params.iter().enumerate() {
            bind_value(statement, value, (i + 1) as c_int)?;
        }
        Ok(())
    }
}

/// Length argument of the bind functions, which take a `c_int`.
fn bind_length(len: usize, index: c_int) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| {
        let error = Error::msg(format!(
            "Parameter {} is {} bytes long, more than sqlite can bind",
            index, len
        ));
        log::error!("{:#}", error);
        error
    })
}

fn bind_value(statement: *mut sqlite3_stmt, value: &Value, index: c_int) -> Result<()> {
    unsafe {
        let rc = match value {
            Value::Null
            | Value::Boolean(None)
            | Value::Int64(None)
            | Value::Float64(None)
            | Value::Varchar(None)
            | Value::Blob(None) => sqlite3_bind_null(statement, index),
            Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
            Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
            Value::Varchar(Some(v)) => sqlite3_bind_text(
                statement,
                index,
                v.as_ptr() as *const c_char,
                bind_length(v.len(), index)?,
                SQLITE_TRANSIENT(),
            ),
            Value::Blob(Some(v)) => sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                bind_length(v.len(), index)?,
                SQLITE_TRANSIENT(),
            ),
        };
        if rc != SQLITE_OK {
            let db = sqlite3_db_handle(statement);
            let query = sqlite3_sql(statement);
            let error = Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string())
                .context(format!(
                    "Cannot bind parameter {} to query:\n{}",
                    index,
                    truncate_long!(CStr::from_ptr(query).to_string_lossy())
                ));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }
}
