use crate::{Statement, Value, separated_by};
use std::borrow::Cow;

/// Column description used by [`SqlWriter::write_create_table`].
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: Cow<'static, str>,
    /// Type prototype, for example `Value::Int64(None)`.
    pub value: Value,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<Cow<'static, str>>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            nullable: true,
            primary_key: false,
        }
    }
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Dialect printer for the few statements this crate emits on its own and for
/// parameter markers.
///
/// Every method has a standard SQL default. Drivers override what their dialect
/// spells differently, the placeholder first of all, so that a statement's text
/// is produced with the right markers up front instead of being patched later.
pub trait SqlWriter {
    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', "\"\"");
        out.push('"');
    }

    /// Marker of the positional parameter at `index` (from 0).
    fn write_placeholder(&self, out: &mut String, _index: usize) {
        out.push('?');
    }

    /// Render the SQL type for a `Value` prototype.
    fn write_column_type(&self, out: &mut String, value: &Value) {
        match value {
            Value::Null => out.push_str("NULL"),
            Value::Boolean(..) => out.push_str("BOOLEAN"),
            Value::Int64(..) => out.push_str("BIGINT"),
            Value::Float64(..) => out.push_str("DOUBLE"),
            Value::Varchar(..) => out.push_str("VARCHAR"),
            Value::Blob(..) => out.push_str("BLOB"),
        }
    }

    /// Emit BEGIN statement.
    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN;");
    }

    /// Emit COMMIT statement.
    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT;");
    }

    /// Emit ROLLBACK statement.
    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK;");
    }

    fn write_create_table(
        &self,
        out: &mut String,
        table: &str,
        columns: &[ColumnDef],
        if_not_exists: bool,
    ) {
        out.reserve(32 + table.len() + columns.len() * 32);
        out.push_str("CREATE TABLE ");
        if if_not_exists {
            out.push_str("IF NOT EXISTS ");
        }
        self.write_identifier_quoted(out, table);
        out.push_str(" (\n");
        separated_by(
            out,
            columns,
            |out, column| {
                self.write_identifier_quoted(out, &column.name);
                out.push(' ');
                self.write_column_type(out, &column.value);
                if column.primary_key {
                    out.push_str(" PRIMARY KEY");
                } else if !column.nullable {
                    out.push_str(" NOT NULL");
                }
            },
            ",\n",
        );
        out.push_str("\n);");
    }

    fn write_drop_table(&self, out: &mut String, table: &str, if_exists: bool) {
        out.push_str("DROP TABLE ");
        if if_exists {
            out.push_str("IF EXISTS ");
        }
        self.write_identifier_quoted(out, table);
        out.push(';');
    }

    /// Emit an INSERT with one placeholder per column. With a `conflict` key the
    /// existing row sharing that key is overwritten instead of failing.
    fn write_insert(&self, out: &mut String, table: &str, columns: &[&str], conflict: Option<&str>) {
        out.push_str("INSERT INTO ");
        self.write_identifier_quoted(out, table);
        out.push_str(" (");
        separated_by(
            out,
            columns,
            |out, column| self.write_identifier_quoted(out, column),
            ", ",
        );
        out.push_str(") VALUES (");
        separated_by(
            out,
            0..columns.len(),
            |out, index| self.write_placeholder(out, index),
            ", ",
        );
        out.push(')');
        if let Some(key) = conflict {
            out.push_str(" ON CONFLICT (");
            self.write_identifier_quoted(out, key);
            out.push(')');
            let updates = columns.iter().filter(|c| **c != key);
            if updates.clone().next().is_none() {
                out.push_str(" DO NOTHING");
            } else {
                out.push_str(" DO UPDATE SET ");
                separated_by(
                    out,
                    updates,
                    |out, column| {
                        self.write_identifier_quoted(out, column);
                        out.push_str(" = EXCLUDED.");
                        self.write_identifier_quoted(out, column);
                    },
                    ", ",
                );
            }
        }
        out.push(';');
    }

    /// Emit a SELECT of `columns` (all of them when empty) ordered by `order_by`.
    fn write_select(&self, out: &mut String, table: &str, columns: &[&str], order_by: &[&str]) {
        out.push_str("SELECT ");
        if columns.is_empty() {
            out.push('*');
        } else {
            separated_by(
                out,
                columns,
                |out, column| self.write_identifier_quoted(out, column),
                ", ",
            );
        }
        out.push_str(" FROM ");
        self.write_identifier_quoted(out, table);
        if !order_by.is_empty() {
            out.push_str(" ORDER BY ");
            separated_by(
                out,
                order_by,
                |out, column| self.write_identifier_quoted(out, column),
                ", ",
            );
        }
        out.push(';');
    }

    /// Build a ready to run INSERT statement binding `row` in column order.
    fn insert<'a>(
        &self,
        table: &str,
        row: impl IntoIterator<Item = (&'a str, Value)>,
        conflict: Option<&str>,
    ) -> Statement
    where
        Self: Sized,
    {
        let (columns, params): (Vec<&str>, Vec<Value>) = row.into_iter().unzip();
        let mut sql = String::with_capacity(64 + columns.len() * 24);
        self.write_insert(&mut sql, table, &columns, conflict);
        Statement {
            sql: sql.into(),
            params,
        }
    }

    /// Build a SELECT statement, see [`SqlWriter::write_select`].
    fn select(&self, table: &str, columns: &[&str], order_by: &[&str]) -> Statement
    where
        Self: Sized,
    {
        let mut sql = String::with_capacity(64);
        self.write_select(&mut sql, table, columns, order_by);
        Statement::new(sql)
    }
}
