use std::{cmp::Ordering, fmt, sync::Arc};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use indexmap::IndexMap;
use ordered_float::NotNan;
use uuid::Uuid;

use crate::{
    container::{ContainerSlot, Wrapper},
    error::{BinderError, Result},
    model::{HostType, ModelResolver},
};

/// Opaque handle to the model, carried into expressions as a captured value.
#[derive(Clone)]
pub struct ModelHandle(pub Arc<dyn ModelResolver>);

impl PartialEq for ModelHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ModelHandle {}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelHandle")
    }
}

/// A record instance: its host type name plus ordered member values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new(type_name: &str) -> Self {
        Self { type_name: type_name.to_string(), fields: IndexMap::new() }
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// One group produced by a `GroupBy` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub key: Value,
    pub items: Vec<Value>,
}

/// Constant and run-time values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(NotNan<f32>),
    Double(NotNan<f64>),
    Decimal(NotNan<f64>),
    Char(char),
    CharArray(Vec<char>),
    String(String),
    Bytes(Vec<u8>),
    Xml(String),
    Guid(Uuid),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeOfDay(NaiveTime),
    TimeSpan(TimeDelta),
    Enum { type_name: String, value: i64 },
    Record(Arc<Record>),
    Collection(Arc<Vec<Value>>),
    Grouping(Arc<Grouping>),
    Dictionary(Arc<IndexMap<String, Value>>),
    Container(Arc<ContainerSlot<Value>>),
    Wrapper(Arc<Wrapper<Value>>),
    Model(ModelHandle),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    pub fn double(f: f64) -> Value {
        NotNan::new(f).map(Value::Double).unwrap_or(Value::Null)
    }

    pub fn decimal(f: f64) -> Value {
        NotNan::new(f).map(Value::Decimal).unwrap_or(Value::Null)
    }

    pub fn collection(items: Vec<Value>) -> Value {
        Value::Collection(Arc::new(items))
    }

    pub fn record(record: Record) -> Value {
        Value::Record(Arc::new(record))
    }

    pub fn dictionary(entries: IndexMap<String, Value>) -> Value {
        Value::Dictionary(Arc::new(entries))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Xml(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::Collection(items) => Some(items),
            Value::Grouping(group) => Some(&group.items),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Value::SByte(v) => *v as i128,
            Value::Byte(v) => *v as i128,
            Value::Int16(v) => *v as i128,
            Value::UInt16(v) => *v as i128,
            Value::Int32(v) => *v as i128,
            Value::UInt32(v) => *v as i128,
            Value::Int64(v) => *v as i128,
            Value::UInt64(v) => *v as i128,
            Value::Enum { value, .. } => *value as i128,
            _ => return None,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Single(v) => Some(v.into_inner() as f64),
            Value::Double(v) | Value::Decimal(v) => Some(v.into_inner()),
            other => other.as_i128().map(|i| i as f64),
        }
    }

    pub fn is_integral(&self) -> bool {
        !matches!(self, Value::Enum { .. }) && self.as_i128().is_some()
    }

    /// Build a typed integral value, failing when it does not fit.
    pub fn from_i128(v: i128, ty: &HostType) -> Result<Value> {
        let overflow = || BinderError::evaluation(format!("value {v} overflows {ty}"));
        Ok(match ty.non_nullable() {
            HostType::SByte => Value::SByte(i8::try_from(v).map_err(|_| overflow())?),
            HostType::Byte => Value::Byte(u8::try_from(v).map_err(|_| overflow())?),
            HostType::Int16 => Value::Int16(i16::try_from(v).map_err(|_| overflow())?),
            HostType::UInt16 => Value::UInt16(u16::try_from(v).map_err(|_| overflow())?),
            HostType::Int32 => Value::Int32(i32::try_from(v).map_err(|_| overflow())?),
            HostType::UInt32 => Value::UInt32(u32::try_from(v).map_err(|_| overflow())?),
            HostType::Int64 => Value::Int64(i64::try_from(v).map_err(|_| overflow())?),
            HostType::UInt64 => Value::UInt64(u64::try_from(v).map_err(|_| overflow())?),
            HostType::Single | HostType::Double | HostType::Decimal => return Value::from_f64(v as f64, ty),
            HostType::Enum(e) => Value::Enum { type_name: e.name.clone(), value: i64::try_from(v).map_err(|_| overflow())? },
            HostType::Object => Value::Int64(i64::try_from(v).map_err(|_| overflow())?),
            other => return Err(BinderError::evaluation(format!("cannot build {other} from an integer"))),
        })
    }

    /// Build a typed numeric value from a float, truncating for integral targets.
    pub fn from_f64(v: f64, ty: &HostType) -> Result<Value> {
        let nan = || BinderError::evaluation("NaN is not a valid numeric value");
        Ok(match ty.non_nullable() {
            HostType::Single => Value::Single(NotNan::new(v as f32).map_err(|_| nan())?),
            HostType::Double | HostType::Object => Value::Double(NotNan::new(v).map_err(|_| nan())?),
            HostType::Decimal => Value::Decimal(NotNan::new(v).map_err(|_| nan())?),
            other if other.is_integral() => return Value::from_i128(v.trunc() as i128, other),
            other => return Err(BinderError::evaluation(format!("cannot build {other} from a float"))),
        })
    }

    /// Run-time type of the value; `None` for null.
    pub fn host_type(&self) -> Option<HostType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => HostType::Bool,
            Value::SByte(_) => HostType::SByte,
            Value::Byte(_) => HostType::Byte,
            Value::Int16(_) => HostType::Int16,
            Value::UInt16(_) => HostType::UInt16,
            Value::Int32(_) => HostType::Int32,
            Value::UInt32(_) => HostType::UInt32,
            Value::Int64(_) => HostType::Int64,
            Value::UInt64(_) => HostType::UInt64,
            Value::Single(_) => HostType::Single,
            Value::Double(_) => HostType::Double,
            Value::Decimal(_) => HostType::Decimal,
            Value::Char(_) => HostType::Char,
            Value::CharArray(_) => HostType::CharArray,
            Value::String(_) => HostType::String,
            Value::Bytes(_) => HostType::Bytes,
            Value::Xml(_) => HostType::Xml,
            Value::Guid(_) => HostType::Guid,
            Value::Date(_) => HostType::Date,
            Value::DateTime(_) => HostType::DateTime,
            Value::DateTimeOffset(_) => HostType::DateTimeOffset,
            Value::TimeOfDay(_) => HostType::TimeOfDay,
            Value::TimeSpan(_) => HostType::TimeSpan,
            // The enum definition lives in the model; callers use `is_instance_of`.
            Value::Enum { .. } => HostType::Object,
            Value::Record(r) => HostType::Record(r.type_name.clone()),
            Value::Collection(_) => HostType::collection_of(HostType::Object),
            Value::Grouping(_) => HostType::grouping_of(HostType::Object, HostType::Object),
            Value::Dictionary(_) => HostType::Dictionary,
            Value::Container(_) => HostType::Container,
            Value::Wrapper(w) => HostType::Wrapper(w.kind),
            Value::Model(_) => HostType::Model,
        })
    }

    /// Whether a non-null value is an instance of `ty` (exact run-time type match,
    /// `Object` accepts everything).
    pub fn is_instance_of(&self, ty: &HostType) -> bool {
        let target = ty.non_nullable();
        match (self, target) {
            (Value::Null, _) => false,
            (_, HostType::Object) => true,
            (Value::Enum { type_name, .. }, HostType::Enum(e)) => *type_name == e.name,
            (Value::Record(r), HostType::Record(name)) => r.type_name == *name,
            (Value::Collection(_), HostType::Collection(_)) => true,
            (Value::Wrapper(w), HostType::Wrapper(kind)) => w.kind == *kind,
            (v, t) => v.host_type().as_ref() == Some(t),
        }
    }

    /// Ordering between two non-null values of compatible kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => Some(a.cmp(b)),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => Some(a.cmp(b)),
            (Value::TimeSpan(a), Value::TimeSpan(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_i128(), b.as_i128()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_f64().zip(b.as_f64()).and_then(|(x, y)| x.partial_cmp(&y)),
            },
        }
    }

    /// Equality across numeric widths, as used by grouping and `Contains`.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => a.compare(b) == Some(Ordering::Equal),
            (a, b) => a == b,
        }
    }

    /// Infer a dynamic value from JSON, the way open properties are stored.
    pub fn infer_from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i32::try_from(i).map(Value::Int32).unwrap_or(Value::Int64(i))
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    n.as_f64().map(Value::double).unwrap_or(Value::Null)
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::collection(items.iter().map(Value::infer_from_json).collect()),
            serde_json::Value::Object(map) => Value::dictionary(
                map.iter().map(|(k, v)| (k.clone(), Value::infer_from_json(v))).collect(),
            ),
        }
    }

    /// Date key used when comparing values of different date types.
    pub fn date_key(&self) -> Option<i64> {
        let date = match self {
            Value::Date(d) => *d,
            Value::DateTime(dt) => dt.date(),
            Value::DateTimeOffset(dto) => dto.date_naive(),
            _ => return None,
        };
        Some(date.year() as i64 * 10000 + date.month() as i64 * 100 + date.day() as i64)
    }

    /// Tick count (100ns units) of the time-of-day part.
    pub fn time_ticks(&self) -> Option<i64> {
        let time = match self {
            Value::TimeOfDay(t) => *t,
            Value::DateTime(dt) => dt.time(),
            Value::DateTimeOffset(dto) => dto.time(),
            Value::TimeSpan(span) => {
                return span.num_microseconds().map(|us| us * 10);
            }
            _ => return None,
        };
        Some(time.num_seconds_from_midnight() as i64 * 10_000_000 + (time.nanosecond() as i64 / 100))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::SByte(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::UInt64(v) => write!(f, "{v}UL"),
            Value::Single(v) => write!(f, "{}f", v.into_inner()),
            Value::Double(v) => write!(f, "{}", v.into_inner()),
            Value::Decimal(v) => write!(f, "{}m", v.into_inner()),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::CharArray(chars) => write!(f, "'{}'", chars.iter().collect::<String>()),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Bytes(b) => write!(f, "Bytes[{}]", b.len()),
            Value::Xml(s) => write!(f, "Xml({s})"),
            Value::Guid(g) => write!(f, "{g}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(d) => write!(f, "{d}"),
            Value::DateTimeOffset(d) => write!(f, "{}", d.to_rfc3339()),
            Value::TimeOfDay(t) => write!(f, "{t}"),
            Value::TimeSpan(span) => write!(f, "{span}"),
            Value::Enum { type_name, value } => write!(f, "{type_name}({value})"),
            Value::Record(r) => write!(f, "{}{{..}}", r.type_name),
            Value::Collection(items) => write!(f, "[{} items]", items.len()),
            Value::Grouping(g) => write!(f, "Grouping({}, {} items)", g.key, g.items.len()),
            Value::Dictionary(d) => write!(f, "{{{} entries}}", d.len()),
            Value::Container(c) => write!(f, "Container[{}]", c.slot_count()),
            Value::Wrapper(w) => write!(f, "{}", w.kind),
            Value::Model(_) => write!(f, "Model"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_integers_respect_width() {
        assert_eq!(Value::from_i128(5, &HostType::Int64).unwrap(), Value::Int64(5));
        assert!(Value::from_i128(70000, &HostType::Int16).is_err());
        assert_eq!(Value::from_f64(2.9, &HostType::Int32).unwrap(), Value::Int32(2));
    }

    #[test]
    fn instance_checks_use_exact_runtime_type() {
        let v = Value::Int32(7);
        assert!(v.is_instance_of(&HostType::Int32));
        assert!(v.is_instance_of(&HostType::Nullable(Box::new(HostType::Int32))));
        assert!(!v.is_instance_of(&HostType::Int64));
        assert!(v.is_instance_of(&HostType::Object));
        assert!(!Value::Null.is_instance_of(&HostType::Object));
    }

    #[test]
    fn json_inference_picks_narrowest_integer() {
        assert_eq!(Value::infer_from_json(&json!(42)), Value::Int32(42));
        assert_eq!(Value::infer_from_json(&json!(5_000_000_000i64)), Value::Int64(5_000_000_000));
        assert_eq!(Value::infer_from_json(&json!(1.5)), Value::double(1.5));
    }

    #[test]
    fn date_keys_ignore_offsets_and_time() {
        let d = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        let dto = Value::DateTimeOffset(DateTime::parse_from_rfc3339("2024-03-09T23:10:00+02:00").unwrap());
        assert_eq!(d.date_key(), Some(20240309));
        assert_eq!(dto.date_key(), d.date_key());
    }

    #[test]
    fn mixed_width_numbers_compare_and_group_equal() {
        assert_eq!(Value::Int32(3).compare(&Value::Int64(4)), Some(Ordering::Less));
        assert!(Value::Int32(3).loosely_equals(&Value::Int64(3)));
        assert!(Value::Int32(3).loosely_equals(&Value::double(3.0)));
        assert!(!Value::Null.loosely_equals(&Value::Int32(0)));
    }
}
