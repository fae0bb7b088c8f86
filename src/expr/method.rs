use std::fmt;

use crate::{
    expr::{aggregates::{averaging_result_type, has_summation_operator}, Expression},
    model::{HostMethod, HostType},
};

/// Every call the binders emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    // string
    Contains,
    StartsWith,
    EndsWith,
    Length,
    IndexOf,
    Substring,
    ToLower,
    ToUpper,
    Trim,
    Concat,
    MatchesPattern,
    // date and time parts
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    FractionalSeconds,
    DatePart,
    TimePart,
    // math
    Round,
    Floor,
    Ceiling,
    // comparison helpers
    /// Three-way ordinal comparison of strings or byte arrays.
    Compare,
    /// Element-wise byte array equality.
    BytesEqual,
    /// Enum flag test: `(value & flag) == flag`.
    HasFlag,
    // collections
    Any,
    All,
    Where,
    Select,
    SelectMany,
    GroupBy,
    CollectionContains,
    /// Cast every element to the given type.
    CastElements(HostType),
    Distinct,
    LongCount,
    Sum,
    Average,
    Min,
    Max,
    ToList,
    // open types
    ContainsKey,
    /// `HasDeclaredProperty(model, instance, name)`: the run-time record type
    /// of `instance` declares `name`.
    HasDeclaredProperty,
    DeclaredProperty,
    /// `DynamicProperty(model, instance, name)`: lookup in the open-property bag.
    DynamicProperty,
    Custom(HostMethod),
}

impl Method {
    pub fn name(&self) -> &str {
        match self {
            Method::Contains => "Contains",
            Method::StartsWith => "StartsWith",
            Method::EndsWith => "EndsWith",
            Method::Length => "Length",
            Method::IndexOf => "IndexOf",
            Method::Substring => "Substring",
            Method::ToLower => "ToLower",
            Method::ToUpper => "ToUpper",
            Method::Trim => "Trim",
            Method::Concat => "Concat",
            Method::MatchesPattern => "MatchesPattern",
            Method::Year => "Year",
            Method::Month => "Month",
            Method::Day => "Day",
            Method::Hour => "Hour",
            Method::Minute => "Minute",
            Method::Second => "Second",
            Method::Millisecond => "Millisecond",
            Method::FractionalSeconds => "FractionalSeconds",
            Method::DatePart => "Date",
            Method::TimePart => "TimeOfDay",
            Method::Round => "Round",
            Method::Floor => "Floor",
            Method::Ceiling => "Ceiling",
            Method::Compare => "Compare",
            Method::BytesEqual => "BytesEqual",
            Method::HasFlag => "HasFlag",
            Method::Any => "Any",
            Method::All => "All",
            Method::Where => "Where",
            Method::Select => "Select",
            Method::SelectMany => "SelectMany",
            Method::GroupBy => "GroupBy",
            Method::CollectionContains => "Contains",
            Method::CastElements(_) => "Cast",
            Method::Distinct => "Distinct",
            Method::LongCount => "LongCount",
            Method::Sum => "Sum",
            Method::Average => "Average",
            Method::Min => "Min",
            Method::Max => "Max",
            Method::ToList => "ToList",
            Method::ContainsKey => "ContainsKey",
            Method::HasDeclaredProperty => "HasDeclaredProperty",
            Method::DeclaredProperty => "DeclaredProperty",
            Method::DynamicProperty => "DynamicProperty",
            Method::Custom(m) => &m.label,
        }
    }

    /// Static result type of the call for the given arguments.
    pub fn result_type(&self, args: &[Expression]) -> HostType {
        let arg_ty = |i: usize| args.get(i).map(Expression::ty).unwrap_or(HostType::Object);
        // element type produced by the selector lambda at `i`, or the source element
        let selected = |i: usize| match args.get(i) {
            Some(Expression::Lambda(l)) => l.return_type(),
            _ => arg_ty(0).element_type().cloned().unwrap_or(HostType::Object),
        };
        let source_element = || arg_ty(0).element_type().cloned().unwrap_or(HostType::Object);

        match self {
            Method::Contains | Method::StartsWith | Method::EndsWith | Method::MatchesPattern => HostType::Bool,
            Method::Length | Method::IndexOf => HostType::Int32,
            Method::Substring | Method::ToLower | Method::ToUpper | Method::Trim | Method::Concat => HostType::String,
            Method::Year
            | Method::Month
            | Method::Day
            | Method::Hour
            | Method::Minute
            | Method::Second
            | Method::Millisecond => HostType::Int32,
            Method::FractionalSeconds => HostType::Decimal,
            Method::DatePart => HostType::Date,
            Method::TimePart => HostType::TimeOfDay,
            Method::Round | Method::Floor | Method::Ceiling => arg_ty(0).non_nullable().clone(),
            Method::Compare => HostType::Int32,
            Method::BytesEqual | Method::HasFlag => HostType::Bool,
            Method::Any | Method::All | Method::CollectionContains => HostType::Bool,
            Method::Where | Method::Distinct => arg_ty(0),
            Method::ToList => HostType::collection_of(source_element()),
            Method::Select => HostType::collection_of(selected(1)),
            Method::SelectMany => {
                HostType::collection_of(selected(1).element_type().cloned().unwrap_or(HostType::Object))
            }
            Method::GroupBy => HostType::collection_of(HostType::grouping_of(selected(1), source_element())),
            Method::CastElements(target) => HostType::collection_of(target.clone()),
            Method::LongCount => HostType::Int64,
            Method::Sum => {
                let input = selected(1);
                if has_summation_operator(&input) { input } else { HostType::Object }
            }
            Method::Average => averaging_result_type(&selected(1)).unwrap_or(HostType::Object),
            Method::Min | Method::Max => selected(1),
            Method::ContainsKey | Method::HasDeclaredProperty => HostType::Bool,
            Method::DeclaredProperty | Method::DynamicProperty => HostType::Object,
            Method::Custom(m) => m.result.clone(),
        }
    }

    /// Collection operators, rendered as extension calls on their first argument.
    pub fn is_collection_operator(&self) -> bool {
        matches!(
            self,
            Method::Any
                | Method::All
                | Method::Where
                | Method::Select
                | Method::SelectMany
                | Method::GroupBy
                | Method::CollectionContains
                | Method::CastElements(_)
                | Method::Distinct
                | Method::LongCount
                | Method::Sum
                | Method::Average
                | Method::Min
                | Method::Max
                | Method::ToList
                | Method::Custom(_)
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::CastElements(ty) => write!(f, "Cast<{ty}>"),
            other => write!(f, "{}", other.name()),
        }
    }
}
