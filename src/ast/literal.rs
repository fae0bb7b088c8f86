use std::fmt::{self, Display};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta};
use ordered_float::NotNan;
use uuid::Uuid;

use crate::{
    expr::Value,
    model::{EdmPrimitive, EdmTypeRef},
};

/// A typed literal as produced by the query parser.
#[derive(Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Bool(bool),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(NotNan<f32>),
    Double(NotNan<f64>),
    Decimal(NotNan<f64>),
    String(String),
    Binary(Vec<u8>),
    Guid(Uuid),
    Date(NaiveDate),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeOfDay(NaiveTime),
    Duration(TimeDelta),
    /// Enum literal in its textual form (`NS.Color'Red'`); parsed by the binder.
    Enum { type_name: String, value: String },
}

impl Literal {
    pub fn string(s: &str) -> Self {
        Literal::String(s.to_string())
    }

    pub fn double(f: f64) -> Self {
        NotNan::new(f).map(Literal::Double).unwrap_or(Literal::Null)
    }

    pub fn decimal(f: f64) -> Self {
        NotNan::new(f).map(Literal::Decimal).unwrap_or(Literal::Null)
    }

    pub fn enumeration(type_name: &str, value: &str) -> Self {
        Literal::Enum { type_name: type_name.to_string(), value: value.to_string() }
    }

    /// Logical type of the literal; `None` for untyped null.
    pub fn edm_type(&self) -> Option<EdmTypeRef> {
        let primitive = |p| Some(EdmTypeRef::primitive(p, false));
        match self {
            Literal::Null => None,
            Literal::Bool(_) => primitive(EdmPrimitive::Boolean),
            Literal::Byte(_) => primitive(EdmPrimitive::Byte),
            Literal::SByte(_) => primitive(EdmPrimitive::SByte),
            Literal::Int16(_) => primitive(EdmPrimitive::Int16),
            Literal::Int32(_) => primitive(EdmPrimitive::Int32),
            Literal::Int64(_) => primitive(EdmPrimitive::Int64),
            Literal::Single(_) => primitive(EdmPrimitive::Single),
            Literal::Double(_) => primitive(EdmPrimitive::Double),
            Literal::Decimal(_) => primitive(EdmPrimitive::Decimal),
            Literal::String(_) => Some(EdmTypeRef::string()),
            Literal::Binary(_) => Some(EdmTypeRef::primitive(EdmPrimitive::Binary, true)),
            Literal::Guid(_) => primitive(EdmPrimitive::Guid),
            Literal::Date(_) => primitive(EdmPrimitive::Date),
            Literal::DateTimeOffset(_) => primitive(EdmPrimitive::DateTimeOffset),
            Literal::TimeOfDay(_) => primitive(EdmPrimitive::TimeOfDay),
            Literal::Duration(_) => primitive(EdmPrimitive::Duration),
            Literal::Enum { type_name, .. } => Some(EdmTypeRef::enumeration(type_name, false)),
        }
    }

    /// Host value of a non-enum literal (enum literals need the model).
    pub fn to_value(&self) -> Option<Value> {
        Some(match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Byte(v) => Value::Byte(*v),
            Literal::SByte(v) => Value::SByte(*v),
            Literal::Int16(v) => Value::Int16(*v),
            Literal::Int32(v) => Value::Int32(*v),
            Literal::Int64(v) => Value::Int64(*v),
            Literal::Single(v) => Value::Single(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::Decimal(v) => Value::Decimal(*v),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Binary(b) => Value::Bytes(b.clone()),
            Literal::Guid(g) => Value::Guid(*g),
            Literal::Date(d) => Value::Date(*d),
            Literal::DateTimeOffset(d) => Value::DateTimeOffset(*d),
            Literal::TimeOfDay(t) => Value::TimeOfDay(*t),
            Literal::Duration(d) => Value::TimeSpan(*d),
            Literal::Enum { .. } => return None,
        })
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Byte(v) => write!(f, "{}", v),
            Literal::SByte(v) => write!(f, "{}", v),
            Literal::Int16(v) => write!(f, "{}", v),
            Literal::Int32(v) => write!(f, "{}", v),
            Literal::Int64(v) => write!(f, "{}L", v),
            Literal::Single(v) => write!(f, "{}f", v.into_inner()),
            Literal::Double(v) => write!(f, "{}d", v.into_inner()),
            Literal::Decimal(v) => write!(f, "{}m", v.into_inner()),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Binary(b) => write!(f, "binary'{} bytes'", b.len()),
            Literal::Guid(g) => write!(f, "{}", g),
            Literal::Date(d) => write!(f, "{}", d),
            Literal::DateTimeOffset(d) => write!(f, "{}", d.to_rfc3339()),
            Literal::TimeOfDay(t) => write!(f, "{}", t),
            Literal::Duration(d) => write!(f, "duration'{}'", d),
            Literal::Enum { type_name, value } => write!(f, "{}'{}'", type_name, value),
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Literal({})", self)
    }
}
