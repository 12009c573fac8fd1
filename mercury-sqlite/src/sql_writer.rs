use mercury_core::{SqlWriter, Value};

pub struct SqliteSqlWriter {}

impl SqlWriter for SqliteSqlWriter {
    fn write_placeholder(&self, out: &mut String, index: usize) {
        out.push('?');
        out.push_str(&(index + 1).to_string());
    }

    fn write_column_type(&self, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) => out.push_str("INTEGER"),
            Value::Int64(..) => out.push_str("INTEGER"),
            Value::Float64(..) => out.push_str("REAL"),
            Value::Varchar(..) => out.push_str("TEXT"),
            Value::Null | Value::Blob(..) => out.push_str("BLOB"),
        }
    }
}
