use crate::{
    ast::QueryNode,
    binder::{BinderContext, NullPropagation, QueryBinder, PATH_SEPARATOR},
    error::{BinderError, Result},
    expr::Expression,
    model::HostType,
};

/// Declared (single-valued, complex, navigation) property access.
pub struct PropertyBinder;

impl PropertyBinder {
    pub fn bind_property(node: &QueryNode, source: &QueryNode, name: &str, ctx: &mut BinderContext) -> Result<Expression> {
        if let Some(flattened) = Self::flattened(node, ctx) {
            return Ok(flattened);
        }
        let source = QueryBinder::bind(source, ctx)?;
        Self::member_access(source, name, ctx)
    }

    /// Replacement recorded by flattening for this property path, if any.
    pub fn flattened(node: &QueryNode, ctx: &BinderContext) -> Option<Expression> {
        if ctx.flattened_properties.is_empty() {
            return None;
        }
        let key = node.property_path()?.join(PATH_SEPARATOR);
        ctx.flattened_properties.get(&key).cloned()
    }

    /// `source.name`, guarded when `source` may be null.
    pub fn member_access(source: Expression, name: &str, ctx: &BinderContext) -> Result<Expression> {
        let source_ty = source.ty();
        let not_found = || BinderError::PropertyNotFound { type_name: source_ty.to_string(), property: name.to_string() };
        let type_name = source_ty.record_name().ok_or_else(not_found)?;
        let member = ctx.model.resolve_member(type_name, name).ok_or_else(not_found)?;

        let access = Self::convert_non_standard(Expression::member(source.clone(), member));
        Ok(NullPropagation::guard_if_needed(&source, access, ctx))
    }

    /// Widen primitives without a common host representation: unsigned
    /// integers to the next signed type, char-like and xml values to strings.
    pub fn convert_non_standard(expr: Expression) -> Expression {
        let ty = expr.ty();
        if !ty.is_non_standard_primitive() {
            return expr;
        }
        let target = match ty.non_nullable() {
            HostType::UInt16 => HostType::Int32,
            HostType::UInt32 => HostType::Int64,
            HostType::UInt64 => HostType::Decimal,
            HostType::Char | HostType::CharArray | HostType::Xml => HostType::String,
            _ => return expr,
        };
        let target = if ty.is_nullable_value_type() { target.to_nullable() } else { target };
        Expression::convert(expr, target)
    }
}
