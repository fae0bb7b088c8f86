use std::fmt;

use crate::model::{EdmTypeRef, HostMethod, HostType};

/// A member of a host record type, resolved from a logical property name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostMember {
    pub declaring_type: String,
    pub name: String,
    pub ty: HostType,
}

impl HostMember {
    pub fn new(declaring_type: &str, name: &str, ty: HostType) -> Self {
        Self {
            declaring_type: declaring_type.to_string(),
            name: name.to_string(),
            ty,
        }
    }
}

/// Schema/model collaborator mapping logical names onto the host representation.
///
/// Implementations are expected to be immutable lookup tables built once per
/// model; the binder calls them once per bound node.
pub trait ModelResolver: fmt::Debug + Send + Sync {
    /// Resolve a declared property of a logical structured type.
    fn resolve_member(&self, type_name: &str, name: &str) -> Option<HostMember>;

    /// Map a logical type reference onto its host type.
    fn resolve_host_type(&self, ty: &EdmTypeRef) -> Option<HostType>;

    /// Whether the logical type accepts undeclared (dynamic) properties.
    fn is_open_type(&self, type_name: &str) -> bool;

    /// The member holding the open-property dictionary of an open type.
    fn dynamic_property_member(&self, type_name: &str) -> Option<HostMember>;

    /// Resolve a custom aggregation method by label and input type.
    fn custom_aggregate_method(&self, label: &str, input: &HostType) -> Option<HostMethod>;

    /// Whether the record type has a schema entry.
    fn has_record_type(&self, type_name: &str) -> bool;
}
