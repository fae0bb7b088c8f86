use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive kinds of the logical (query language) type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdmPrimitive {
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Binary,
    Guid,
    Date,
    DateTimeOffset,
    TimeOfDay,
    Duration,
}

impl EdmPrimitive {
    pub fn name(&self) -> &'static str {
        match self {
            EdmPrimitive::Boolean => "Edm.Boolean",
            EdmPrimitive::Byte => "Edm.Byte",
            EdmPrimitive::SByte => "Edm.SByte",
            EdmPrimitive::Int16 => "Edm.Int16",
            EdmPrimitive::Int32 => "Edm.Int32",
            EdmPrimitive::Int64 => "Edm.Int64",
            EdmPrimitive::Single => "Edm.Single",
            EdmPrimitive::Double => "Edm.Double",
            EdmPrimitive::Decimal => "Edm.Decimal",
            EdmPrimitive::String => "Edm.String",
            EdmPrimitive::Binary => "Edm.Binary",
            EdmPrimitive::Guid => "Edm.Guid",
            EdmPrimitive::Date => "Edm.Date",
            EdmPrimitive::DateTimeOffset => "Edm.DateTimeOffset",
            EdmPrimitive::TimeOfDay => "Edm.TimeOfDay",
            EdmPrimitive::Duration => "Edm.Duration",
        }
    }

    /// Parse a qualified primitive name such as `Edm.Int64` (the `Edm.` prefix is optional).
    pub fn from_name(name: &str) -> Option<EdmPrimitive> {
        let short = name.strip_prefix("Edm.").unwrap_or(name);
        let kind = match short {
            "Boolean" => EdmPrimitive::Boolean,
            "Byte" => EdmPrimitive::Byte,
            "SByte" => EdmPrimitive::SByte,
            "Int16" => EdmPrimitive::Int16,
            "Int32" => EdmPrimitive::Int32,
            "Int64" => EdmPrimitive::Int64,
            "Single" => EdmPrimitive::Single,
            "Double" => EdmPrimitive::Double,
            "Decimal" => EdmPrimitive::Decimal,
            "String" => EdmPrimitive::String,
            "Binary" => EdmPrimitive::Binary,
            "Guid" => EdmPrimitive::Guid,
            "Date" => EdmPrimitive::Date,
            "DateTimeOffset" => EdmPrimitive::DateTimeOffset,
            "TimeOfDay" => EdmPrimitive::TimeOfDay,
            "Duration" => EdmPrimitive::Duration,
            _ => return None,
        };
        Some(kind)
    }
}

/// Logical type definition referenced by AST nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdmType {
    Primitive(EdmPrimitive),
    Enum(String),
    Complex(String),
    Entity(String),
    Collection(Box<EdmTypeRef>),
    /// Type of open (dynamic) values whose shape is only known at run time.
    Untyped,
}

/// A logical type plus its nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdmTypeRef {
    pub kind: EdmType,
    pub nullable: bool,
}

impl EdmTypeRef {
    pub fn new(kind: EdmType, nullable: bool) -> Self {
        Self { kind, nullable }
    }

    pub fn primitive(primitive: EdmPrimitive, nullable: bool) -> Self {
        Self::new(EdmType::Primitive(primitive), nullable)
    }

    pub fn boolean(nullable: bool) -> Self { Self::primitive(EdmPrimitive::Boolean, nullable) }
    pub fn int32(nullable: bool) -> Self { Self::primitive(EdmPrimitive::Int32, nullable) }
    pub fn int64(nullable: bool) -> Self { Self::primitive(EdmPrimitive::Int64, nullable) }
    pub fn double(nullable: bool) -> Self { Self::primitive(EdmPrimitive::Double, nullable) }
    pub fn decimal(nullable: bool) -> Self { Self::primitive(EdmPrimitive::Decimal, nullable) }
    pub fn string() -> Self { Self::primitive(EdmPrimitive::String, true) }

    pub fn entity(name: &str) -> Self {
        Self::new(EdmType::Entity(name.to_string()), true)
    }

    pub fn complex(name: &str, nullable: bool) -> Self {
        Self::new(EdmType::Complex(name.to_string()), nullable)
    }

    pub fn enumeration(name: &str, nullable: bool) -> Self {
        Self::new(EdmType::Enum(name.to_string()), nullable)
    }

    pub fn collection(element: EdmTypeRef) -> Self {
        Self::new(EdmType::Collection(Box::new(element)), true)
    }

    pub fn untyped() -> Self {
        Self::new(EdmType::Untyped, true)
    }

    pub fn as_primitive(&self) -> Option<EdmPrimitive> {
        match &self.kind {
            EdmType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.as_primitive().is_some()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, EdmType::Enum(_))
    }

    pub fn is_structured(&self) -> bool {
        matches!(self.kind, EdmType::Complex(_) | EdmType::Entity(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, EdmType::Collection(_))
    }

    pub fn full_name(&self) -> String {
        match &self.kind {
            EdmType::Primitive(p) => p.name().to_string(),
            EdmType::Enum(name) | EdmType::Complex(name) | EdmType::Entity(name) => name.clone(),
            EdmType::Collection(element) => format!("Collection({})", element.full_name()),
            EdmType::Untyped => "Edm.Untyped".to_string(),
        }
    }
}

impl fmt::Display for EdmTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable && !self.is_collection() {
            write!(f, "{}?", self.full_name())
        } else {
            write!(f, "{}", self.full_name())
        }
    }
}
