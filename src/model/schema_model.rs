use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    error::{BinderError, Result},
    expr::{aggregates::AggregateImpl, Record, Value},
    model::{EdmPrimitive, EdmType, EdmTypeRef, EnumType, HostMember, HostMethod, HostType, ModelResolver},
};

/// Declared members of one structured type.
///
/// The logical type and its host record share the same qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: String,
    /// Map of member name -> host type, in declaration order
    pub members: IndexMap<String, HostType>,
    /// Name of the member holding undeclared properties, for open types.
    pub dynamic_member: Option<String>,
}

impl RecordSchema {
    pub fn new(name: &str, members: &[(&str, HostType)]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|(n, t)| (n.to_string(), t.clone())).collect(),
            dynamic_member: None,
        }
    }

    pub fn open(mut self, dynamic_member: &str) -> Self {
        self.members.insert(dynamic_member.to_string(), HostType::Dictionary);
        self.dynamic_member = Some(dynamic_member.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&HostType> {
        self.members.get(name)
    }
}

/// Lookup-table model: record types, enums and custom aggregation methods,
/// built once and shared by every binder context.
#[derive(Clone, Default)]
pub struct SchemaModel {
    records: IndexMap<String, RecordSchema>,
    enums: IndexMap<String, Arc<EnumType>>,
    custom_aggregates: HashMap<String, Arc<dyn AggregateImpl>>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: RecordSchema) -> Self {
        self.records.insert(record.name.clone(), record);
        self
    }

    pub fn with_enum(mut self, enum_type: EnumType) -> Self {
        self.enums.insert(enum_type.name.clone(), Arc::new(enum_type));
        self
    }

    /// Register a custom aggregation method under a case-insensitive label.
    pub fn with_custom_aggregate<I: AggregateImpl + 'static>(mut self, label: &str, implementation: I) -> Self {
        self.custom_aggregates.insert(label.to_ascii_lowercase(), Arc::new(implementation));
        self
    }

    pub fn record(&self, name: &str) -> Option<&RecordSchema> {
        self.records.get(name)
    }

    pub fn enum_type(&self, name: &str) -> Option<Arc<EnumType>> {
        self.enums.get(name).cloned()
    }

    /// Host type of an enum, for use in record member declarations.
    pub fn enum_host_type(&self, name: &str) -> Option<HostType> {
        self.enum_type(name).map(HostType::Enum)
    }

    pub fn into_resolver(self) -> Arc<dyn ModelResolver> {
        Arc::new(self)
    }

    /// Build a record value of `type_name` from a JSON object.
    ///
    /// Undeclared keys of an open type land in its dynamic-property dictionary,
    /// with their types inferred from the JSON shape.
    pub fn record_from_json(&self, type_name: &str, json: &serde_json::Value) -> Result<Value> {
        let schema = self
            .records
            .get(type_name)
            .ok_or_else(|| BinderError::ResourceTypeNotInModel(type_name.to_string()))?;
        let object = json
            .as_object()
            .ok_or_else(|| BinderError::type_mismatch(type_name, json))?;

        let mut record = Record::new(type_name);
        let mut dynamic = IndexMap::new();
        for (name, ty) in &schema.members {
            if Some(name) == schema.dynamic_member.as_ref() {
                continue;
            }
            let value = match object.get(name) {
                Some(v) => self.value_from_json(v, ty)?,
                None => Value::Null,
            };
            record.fields.insert(name.clone(), value);
        }
        for (key, v) in object {
            if !schema.members.contains_key(key) {
                dynamic.insert(key.clone(), Value::infer_from_json(v));
            }
        }
        if let Some(member) = &schema.dynamic_member {
            let bag = match object.get(member) {
                Some(serde_json::Value::Null) => Value::Null,
                _ => Value::dictionary(dynamic),
            };
            record.fields.insert(member.clone(), bag);
        }
        Ok(Value::record(record))
    }

    /// Convert a JSON value to a typed value of `ty`.
    pub fn value_from_json(&self, json: &serde_json::Value, ty: &HostType) -> Result<Value> {
        use serde_json::Value as Json;

        let mismatch = || BinderError::type_mismatch(ty, json);
        if json.is_null() {
            return if ty.is_nullable() { Ok(Value::Null) } else { Err(mismatch()) };
        }
        let text = || json.as_str().ok_or_else(mismatch);

        Ok(match ty.non_nullable() {
            HostType::Bool => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
            t if t.is_integral() => {
                let n = json.as_i64().map(i128::from).or_else(|| json.as_u64().map(i128::from)).ok_or_else(mismatch)?;
                Value::from_i128(n, t)?
            }
            t @ (HostType::Single | HostType::Double | HostType::Decimal) => {
                Value::from_f64(json.as_f64().ok_or_else(mismatch)?, t)?
            }
            HostType::Char => Value::Char(text()?.chars().next().ok_or_else(mismatch)?),
            HostType::CharArray => Value::CharArray(text()?.chars().collect()),
            HostType::String => Value::String(text()?.to_string()),
            HostType::Xml => Value::Xml(text()?.to_string()),
            HostType::Bytes => match json {
                Json::String(s) => Value::Bytes(s.as_bytes().to_vec()),
                Json::Array(items) => Value::Bytes(
                    items
                        .iter()
                        .map(|i| i.as_u64().and_then(|b| u8::try_from(b).ok()).ok_or_else(mismatch))
                        .collect::<Result<_>>()?,
                ),
                _ => return Err(mismatch()),
            },
            HostType::Guid => Value::Guid(Uuid::parse_str(text()?).map_err(|_| mismatch())?),
            HostType::Date => Value::Date(NaiveDate::parse_from_str(text()?, "%Y-%m-%d").map_err(|_| mismatch())?),
            HostType::DateTime => {
                Value::DateTime(NaiveDateTime::parse_from_str(text()?, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| mismatch())?)
            }
            HostType::DateTimeOffset => Value::DateTimeOffset(DateTime::parse_from_rfc3339(text()?).map_err(|_| mismatch())?),
            HostType::TimeOfDay => Value::TimeOfDay(NaiveTime::parse_from_str(text()?, "%H:%M:%S%.f").map_err(|_| mismatch())?),
            HostType::TimeSpan => {
                let seconds = json.as_f64().ok_or_else(mismatch)?;
                Value::TimeSpan(TimeDelta::microseconds((seconds * 1_000_000.0) as i64))
            }
            HostType::Enum(e) => {
                let value = match json {
                    Json::String(s) => e.try_parse(s),
                    other => other.as_i64(),
                }
                .ok_or_else(|| BinderError::InvalidEnumValue { enum_type: e.name.clone(), value: json.to_string() })?;
                Value::Enum { type_name: e.name.clone(), value }
            }
            HostType::Record(name) => return self.record_from_json(name, json),
            HostType::Collection(element) => Value::collection(
                json.as_array()
                    .ok_or_else(mismatch)?
                    .iter()
                    .map(|item| self.value_from_json(item, element))
                    .collect::<Result<_>>()?,
            ),
            HostType::Dictionary | HostType::Object => Value::infer_from_json(json),
            _ => return Err(mismatch()),
        })
    }

    fn primitive_host_type(primitive: EdmPrimitive) -> HostType {
        match primitive {
            EdmPrimitive::Boolean => HostType::Bool,
            EdmPrimitive::Byte => HostType::Byte,
            EdmPrimitive::SByte => HostType::SByte,
            EdmPrimitive::Int16 => HostType::Int16,
            EdmPrimitive::Int32 => HostType::Int32,
            EdmPrimitive::Int64 => HostType::Int64,
            EdmPrimitive::Single => HostType::Single,
            EdmPrimitive::Double => HostType::Double,
            EdmPrimitive::Decimal => HostType::Decimal,
            EdmPrimitive::String => HostType::String,
            EdmPrimitive::Binary => HostType::Bytes,
            EdmPrimitive::Guid => HostType::Guid,
            EdmPrimitive::Date => HostType::Date,
            EdmPrimitive::DateTimeOffset => HostType::DateTimeOffset,
            EdmPrimitive::TimeOfDay => HostType::TimeOfDay,
            EdmPrimitive::Duration => HostType::TimeSpan,
        }
    }
}

impl fmt::Debug for SchemaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aggregates: Vec<_> = self.custom_aggregates.keys().collect();
        aggregates.sort();
        f.debug_struct("SchemaModel")
            .field("records", &self.records.keys().collect::<Vec<_>>())
            .field("enums", &self.enums.keys().collect::<Vec<_>>())
            .field("custom_aggregates", &aggregates)
            .finish()
    }
}

impl ModelResolver for SchemaModel {
    fn resolve_member(&self, type_name: &str, name: &str) -> Option<HostMember> {
        let ty = self.records.get(type_name)?.get(name)?;
        Some(HostMember::new(type_name, name, ty.clone()))
    }

    fn resolve_host_type(&self, ty: &EdmTypeRef) -> Option<HostType> {
        let host = match &ty.kind {
            EdmType::Primitive(p) => Self::primitive_host_type(*p),
            EdmType::Enum(name) => self.enum_host_type(name)?,
            EdmType::Complex(name) | EdmType::Entity(name) => {
                self.records.contains_key(name).then(|| HostType::record(name))?
            }
            EdmType::Collection(element) => HostType::collection_of(self.resolve_host_type(element)?),
            EdmType::Untyped => HostType::Object,
        };
        Some(if ty.nullable { host.to_nullable() } else { host })
    }

    fn is_open_type(&self, type_name: &str) -> bool {
        self.records.get(type_name).is_some_and(|r| r.dynamic_member.is_some())
    }

    fn dynamic_property_member(&self, type_name: &str) -> Option<HostMember> {
        let member = self.records.get(type_name)?.dynamic_member.as_deref()?;
        self.resolve_member(type_name, member)
    }

    fn custom_aggregate_method(&self, label: &str, input: &HostType) -> Option<HostMethod> {
        let implementation = self.custom_aggregates.get(&label.to_ascii_lowercase())?;
        HostMethod::resolve(label, input, implementation.clone())
    }

    fn has_record_type(&self, type_name: &str) -> bool {
        self.records.contains_key(type_name)
    }
}
