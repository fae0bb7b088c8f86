use std::{fmt, sync::Arc};

use crate::container::WrapperKind;

/// Enum definition as seen by the host representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub name: String,
    /// Integral type backing the enum values.
    pub underlying: Box<HostType>,
    pub members: Vec<(String, i64)>,
    pub is_flags: bool,
}

impl EnumType {
    pub fn new(name: &str, members: &[(&str, i64)]) -> Self {
        Self {
            name: name.to_string(),
            underlying: Box::new(HostType::Int32),
            members: members.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
            is_flags: false,
        }
    }

    pub fn flags(mut self) -> Self {
        self.is_flags = true;
        self
    }

    pub fn with_underlying(mut self, underlying: HostType) -> Self {
        self.underlying = Box::new(underlying);
        self
    }

    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members.iter().find(|(n, _)| n == member).map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.members.iter().find(|(_, v)| *v == value).map(|(n, _)| n.as_str())
    }

    /// Parse a literal the way the query language spells enum values:
    /// a member name, a comma separated list of flag names, or a number.
    pub fn try_parse(&self, text: &str) -> Option<i64> {
        let text = text.trim();
        if let Ok(number) = text.parse::<i64>() {
            return Some(number);
        }
        if self.is_flags && text.contains(',') {
            let mut acc = 0i64;
            for part in text.split(',') {
                acc |= self.value_of(part.trim())?;
            }
            return Some(acc);
        }
        self.value_of(text)
    }
}

/// Static types of the produced expression graph.
///
/// Reference-like variants (strings, byte arrays, records, collections, the
/// dynamic `Object` slot, ...) can hold null without a `Nullable` wrapper; value
/// types need `Nullable` to do so.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    Bool,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    Char,
    CharArray,
    String,
    Bytes,
    Guid,
    Date,
    DateTime,
    DateTimeOffset,
    TimeOfDay,
    TimeSpan,
    Xml,
    Enum(Arc<EnumType>),
    Record(String),
    Collection(Box<HostType>),
    Grouping { key: Box<HostType>, element: Box<HostType> },
    /// Open-property bag of a dynamic record.
    Dictionary,
    /// Dynamically typed value.
    Object,
    Nullable(Box<HostType>),
    Container,
    Wrapper(WrapperKind),
    Model,
}

impl HostType {
    pub fn collection_of(element: HostType) -> HostType {
        HostType::Collection(Box::new(element))
    }

    pub fn grouping_of(key: HostType, element: HostType) -> HostType {
        HostType::Grouping { key: Box::new(key), element: Box::new(element) }
    }

    pub fn record(name: &str) -> HostType {
        HostType::Record(name.to_string())
    }

    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            HostType::Bool
                | HostType::SByte
                | HostType::Byte
                | HostType::Int16
                | HostType::UInt16
                | HostType::Int32
                | HostType::UInt32
                | HostType::Int64
                | HostType::UInt64
                | HostType::Single
                | HostType::Double
                | HostType::Decimal
                | HostType::Char
                | HostType::Guid
                | HostType::Date
                | HostType::DateTime
                | HostType::DateTimeOffset
                | HostType::TimeOfDay
                | HostType::TimeSpan
                | HostType::Enum(_)
        )
    }

    pub fn is_nullable(&self) -> bool {
        !self.is_value_type()
    }

    pub fn is_nullable_value_type(&self) -> bool {
        matches!(self, HostType::Nullable(_))
    }

    pub fn to_nullable(&self) -> HostType {
        if self.is_value_type() {
            HostType::Nullable(Box::new(self.clone()))
        } else {
            self.clone()
        }
    }

    pub fn non_nullable(&self) -> &HostType {
        match self {
            HostType::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.non_nullable(), HostType::Bool)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self.non_nullable(),
            HostType::SByte
                | HostType::Byte
                | HostType::Int16
                | HostType::UInt16
                | HostType::Int32
                | HostType::UInt32
                | HostType::Int64
                | HostType::UInt64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral()
            || matches!(self.non_nullable(), HostType::Single | HostType::Double | HostType::Decimal)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, HostType::String)
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, HostType::Bytes)
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self.non_nullable() {
            HostType::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_date_family(&self) -> bool {
        matches!(self.non_nullable(), HostType::Date | HostType::DateTime | HostType::DateTimeOffset)
    }

    pub fn is_time_family(&self) -> bool {
        matches!(self.non_nullable(), HostType::TimeOfDay | HostType::TimeSpan)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, HostType::Object)
    }

    pub fn element_type(&self) -> Option<&HostType> {
        match self {
            HostType::Collection(element) => Some(element),
            HostType::Grouping { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn record_name(&self) -> Option<&str> {
        match self {
            HostType::Record(name) => Some(name),
            _ => None,
        }
    }

    /// Types without a native representation in the common host primitive set.
    pub fn is_non_standard_primitive(&self) -> bool {
        matches!(
            self.non_nullable(),
            HostType::UInt16 | HostType::UInt32 | HostType::UInt64 | HostType::Char | HostType::CharArray | HostType::Xml
        )
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Bool => write!(f, "Bool"),
            HostType::SByte => write!(f, "SByte"),
            HostType::Byte => write!(f, "Byte"),
            HostType::Int16 => write!(f, "Int16"),
            HostType::UInt16 => write!(f, "UInt16"),
            HostType::Int32 => write!(f, "Int32"),
            HostType::UInt32 => write!(f, "UInt32"),
            HostType::Int64 => write!(f, "Int64"),
            HostType::UInt64 => write!(f, "UInt64"),
            HostType::Single => write!(f, "Single"),
            HostType::Double => write!(f, "Double"),
            HostType::Decimal => write!(f, "Decimal"),
            HostType::Char => write!(f, "Char"),
            HostType::CharArray => write!(f, "Char[]"),
            HostType::String => write!(f, "String"),
            HostType::Bytes => write!(f, "Byte[]"),
            HostType::Guid => write!(f, "Guid"),
            HostType::Date => write!(f, "Date"),
            HostType::DateTime => write!(f, "DateTime"),
            HostType::DateTimeOffset => write!(f, "DateTimeOffset"),
            HostType::TimeOfDay => write!(f, "TimeOfDay"),
            HostType::TimeSpan => write!(f, "TimeSpan"),
            HostType::Xml => write!(f, "Xml"),
            HostType::Enum(e) => write!(f, "{}", e.name),
            HostType::Record(name) => write!(f, "{}", name),
            HostType::Collection(element) => write!(f, "Collection<{}>", element),
            HostType::Grouping { key, element } => write!(f, "Grouping<{}, {}>", key, element),
            HostType::Dictionary => write!(f, "Dictionary<String, Object>"),
            HostType::Object => write!(f, "Object"),
            HostType::Nullable(inner) => write!(f, "{}?", inner),
            HostType::Container => write!(f, "Container"),
            HostType::Wrapper(kind) => write!(f, "{}", kind),
            HostType::Model => write!(f, "Model"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullability_of_value_and_reference_types() {
        assert!(!HostType::Int32.is_nullable());
        assert!(HostType::Int32.to_nullable().is_nullable());
        assert_eq!(HostType::Int32.to_nullable().to_nullable(), HostType::Nullable(Box::new(HostType::Int32)));
        assert!(HostType::String.is_nullable());
        assert_eq!(HostType::String.to_nullable(), HostType::String);
        assert_eq!(HostType::Int64.to_nullable().non_nullable(), &HostType::Int64);
    }

    #[test]
    fn enum_try_parse_names_numbers_and_flags() {
        let color = EnumType::new("NS.Color", &[("Red", 1), ("Green", 2), ("Blue", 4)]).flags();
        assert_eq!(color.try_parse("Green"), Some(2));
        assert_eq!(color.try_parse("Red, Blue"), Some(5));
        assert_eq!(color.try_parse("4"), Some(4));
        assert_eq!(color.try_parse("Purple"), None);

        let plain = EnumType::new("NS.Size", &[("Small", 0), ("Large", 1)]);
        assert_eq!(plain.try_parse("Small, Large"), None);
    }

    #[test]
    fn display_renders_nested_types() {
        let t = HostType::collection_of(HostType::Int32.to_nullable());
        assert_eq!(t.to_string(), "Collection<Int32?>");
    }
}
