use std::sync::atomic::{AtomicU32, Ordering};

use crate::{expr::Expression, model::HostType};

static NEXT_PARAMETER_ID: AtomicU32 = AtomicU32::new(1);

/// A lambda parameter. Identity is the `id`: two parameters with the same name
/// and type are still different bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub id: u32,
    pub name: String,
    pub ty: HostType,
}

impl Parameter {
    pub fn new(name: &str, ty: HostType) -> Self {
        Self {
            id: NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub parameters: Vec<Parameter>,
    pub body: Box<Expression>,
}

impl Lambda {
    pub fn new(parameter: Parameter, body: Expression) -> Self {
        Self { parameters: vec![parameter], body: Box::new(body) }
    }

    /// The first (for the binders, the only) parameter.
    pub fn parameter(&self) -> Option<&Parameter> {
        self.parameters.first()
    }

    pub fn return_type(&self) -> HostType {
        self.body.ty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_with_same_name_are_distinct() {
        let a = Parameter::new("$it", HostType::Int32);
        let b = Parameter::new("$it", HostType::Int32);
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }
}
