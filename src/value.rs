//! The tagged value union shared by every driver.
//!
//! [`Value`] is the owned form clients bind as parameters and read back from
//! completed rows. [`ValueRef`] is the borrowed form a driver hands to a
//! [`crate::driver::RowSink`] while streaming a query; its lifetime is tied
//! to the single row-callback invocation that produced it (spec.md §3).

use std::fmt;

/// An owned SQL value.
///
/// `TEXT` and `BLOB` own their bytes; there is no lifetime to track once a
/// value has been materialized into this form.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Null,
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// The kind tag, independent of the carried payload.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::I64(_) => ValueKind::I64,
            Value::U64(_) => ValueKind::U64,
            Value::F64(_) => ValueKind::F64,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
            Value::Blob(_) => ValueKind::Blob,
        }
    }

    /// Borrows this value without copying, for driver parameter binding.
    pub fn as_ref(&self) -> ValueRef<'_> {
        match self {
            Value::Null => ValueRef::Null,
            Value::I64(v) => ValueRef::I64(*v),
            Value::U64(v) => ValueRef::U64(*v),
            Value::F64(v) => ValueRef::F64(*v),
            Value::Bool(v) => ValueRef::Bool(*v),
            Value::Text(v) => ValueRef::Text(v),
            Value::Blob(v) => ValueRef::Blob(v),
        }
    }

    /// Canonical decimal text for a text-protocol driver binding a numeric
    /// parameter (spec.md §9).
    pub fn to_canonical_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::I64(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Bool(v) => if *v { "true" } else { "false" }.to_owned(),
            Value::Text(v) => v.clone(),
            Value::Blob(v) => String::from_utf8_lossy(v).into_owned(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! from_owned {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        }
    };
}

from_owned!(i64, I64);
from_owned!(u64, U64);
from_owned!(f64, F64);
from_owned!(bool, Bool);
from_owned!(String, Text);
from_owned!(Vec<u8>, Blob);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_owned())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// The closed set of value kinds (spec.md §3).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ValueKind {
    Null,
    I64,
    U64,
    F64,
    Bool,
    Text,
    Blob,
}

/// A value borrowed from a driver's row buffer.
///
/// `Text`/`Blob` ranges are only valid while the [`crate::driver::RowSink`]
/// invocation that produced them is still executing (spec.md §3, §4.1).
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ValueRef<'a> {
    Null,
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Text(&'a str),
    Blob(&'a [u8]),
}

impl<'a> ValueRef<'a> {
    /// Deep-copies this borrow into an owned [`Value`]. This is the single
    /// point at which a TEXT/BLOB byte range is duplicated when a row must
    /// cross a thread boundary (spec.md §4.4 step 1).
    pub fn to_owned(self) -> Value {
        match self {
            ValueRef::Null => Value::Null,
            ValueRef::I64(v) => Value::I64(v),
            ValueRef::U64(v) => Value::U64(v),
            ValueRef::F64(v) => Value::F64(v),
            ValueRef::Bool(v) => Value::Bool(v),
            ValueRef::Text(v) => Value::Text(v.to_owned()),
            ValueRef::Blob(v) => Value::Blob(v.to_owned()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ValueRef::Null => ValueKind::Null,
            ValueRef::I64(_) => ValueKind::I64,
            ValueRef::U64(_) => ValueKind::U64,
            ValueRef::F64(_) => ValueKind::F64,
            ValueRef::Bool(_) => ValueKind::Bool,
            ValueRef::Text(_) => ValueKind::Text,
            ValueRef::Blob(_) => ValueKind::Blob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_value_ref() {
        let v = Value::Text("hello".into());
        let borrowed = v.as_ref();
        assert_eq!(borrowed, ValueRef::Text("hello"));
        assert_eq!(borrowed.to_owned(), v);
    }

    #[test]
    fn option_none_becomes_null() {
        let v: Value = Option::<i64>::None.into();
        assert_eq!(v, Value::Null);
        let v: Value = Some(7i64).into();
        assert_eq!(v, Value::I64(7));
    }

    #[test]
    fn canonical_text_is_round_trip_safe_for_float() {
        let v = Value::F64(0.1 + 0.2);
        let s = v.to_canonical_text();
        let parsed: f64 = s.parse().unwrap();
        assert_eq!(parsed, 0.1 + 0.2);
    }
}
