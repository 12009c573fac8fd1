use crate::{Error, Result, Value};
use std::{any, borrow::Cow};

/// Conversion between native Rust scalars and the dynamically typed [`Value`]
/// used for statement parameters and result rows.
///
/// Integers of any width up to 64 bits map to `Value::Int64`, floats to
/// `Value::Float64`. Conversions out of a `Value` are range checked and fail
/// with a message naming both the offending value and the target type.
///
/// ```rust
/// use mercury_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Int64(Some(42)));
/// let n: i32 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The NULL prototype of this type, used to describe a column.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} value `{}` into {}",
        value.type_name(),
        value,
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value_integer {
    ($($source:ty),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_empty_value() -> Value {
                    Value::Int64(None)
                }
                fn as_value(self) -> Value {
                    Value::Int64(Some(self as i64))
                }
                fn try_from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int64(Some(v)) => <$source>::try_from(v).map_err(|_| {
                            Error::msg(format!(
                                "Value `{}` is out of range for {}",
                                v,
                                any::type_name::<$source>()
                            ))
                        }),
                        Value::Boolean(Some(v)) => Ok(v as $source),
                        _ => Err(mismatch::<$source>(&value)),
                    }
                }
            }
        )+
    };
}

impl_as_value_integer!(i8, i16, i32, i64, u8, u16, u32);

impl AsValue for u64 {
    fn as_empty_value() -> Value {
        Value::Int64(None)
    }
    // Values above i64::MAX are stored as their two's complement bit pattern.
    fn as_value(self) -> Value {
        Value::Int64(Some(self as i64))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int64(Some(v)) => Ok(v as u64),
            Value::Boolean(Some(v)) => Ok(v as u64),
            _ => Err(mismatch::<u64>(&value)),
        }
    }
}

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Int64(Some(v)) => Ok(v != 0),
            _ => Err(mismatch::<bool>(&value)),
        }
    }
}

impl AsValue for f64 {
    fn as_empty_value() -> Value {
        Value::Float64(None)
    }
    fn as_value(self) -> Value {
        Value::Float64(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float64(Some(v)) => Ok(v),
            Value::Int64(Some(v)) => Ok(v as f64),
            _ => Err(mismatch::<f64>(&value)),
        }
    }
}

impl AsValue for f32 {
    fn as_empty_value() -> Value {
        Value::Float64(None)
    }
    fn as_value(self) -> Value {
        Value::Float64(Some(self as f64))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        f64::try_from_value(value).map(|v| v as f32)
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            Value::Blob(Some(v)) => String::from_utf8(v.into_vec())
                .map_err(|e| Error::new(e).context("Blob value is not valid UTF-8")),
            _ => Err(mismatch::<String>(&value)),
        }
    }
}

impl AsValue for &str {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.to_owned()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Err(Error::msg(format!(
            "Cannot borrow a &str out of an owned {} value, convert into String instead",
            value.type_name()
        )))
    }
}

impl AsValue for Cow<'_, str> {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.into_owned()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Cow::Owned)
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v.into_vec()),
            Value::Varchar(Some(v)) => Ok(v.into_bytes()),
            _ => Err(mismatch::<Vec<u8>>(&value)),
        }
    }
}

impl AsValue for &[u8] {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Err(Error::msg(format!(
            "Cannot borrow a &[u8] out of an owned {} value, convert into Vec<u8> instead",
            value.type_name()
        )))
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

#[cfg(test)]
mod tests {
    use crate::{AsValue, Value};

    #[test]
    fn integers_widen_and_check_range() {
        assert_eq!(7u8.as_value(), Value::Int64(Some(7)));
        assert_eq!((-3i16).as_value(), Value::Int64(Some(-3)));
        assert_eq!(i8::try_from_value(Value::Int64(Some(-128))).unwrap(), -128);
        assert!(i8::try_from_value(Value::Int64(Some(300))).is_err());
        assert!(u32::try_from_value(Value::Int64(Some(-1))).is_err());
        assert_eq!(u64::try_from_value(u64::MAX.as_value()).unwrap(), u64::MAX);
    }

    #[test]
    fn options_map_to_typed_nulls() {
        let value: Value = None::<String>.into();
        assert_eq!(value, Value::Varchar(None));
        assert!(value.is_null());
        assert_eq!(Option::<i64>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i64>::try_from_value(Value::Int64(Some(5))).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn mismatched_types_are_rejected() {
        let error = bool::try_from_value(Value::Varchar(Some("yes".into()))).unwrap_err();
        assert!(format!("{error}").contains("bool"));
        assert!(f64::try_from_value(Value::Blob(Some([1u8].into()))).is_err());
        assert_eq!(f64::try_from_value(Value::Int64(Some(2))).unwrap(), 2.0);
    }
}
