use tracing::trace;

use crate::{
    ast::{Literal, QueryNode, UnaryOperatorKind},
    binder::{
        BinaryBinder, BinderContext, CollectionBinder, ConvertBinder, DynamicPropertyBinder, FunctionBinder,
        PropertyBinder,
    },
    error::{BinderError, Result},
    expr::{Expression, UnaryOp, Value},
    model::{EdmTypeRef, HostType},
};

/// Dispatch from AST node kind to its translation rule.
pub struct QueryBinder;

impl QueryBinder {
    pub fn bind(node: &QueryNode, ctx: &mut BinderContext) -> Result<Expression> {
        trace!(kind = node.kind_name(), "bind");
        ctx.descend(|ctx| Self::bind_node(node, ctx))
    }

    fn bind_node(node: &QueryNode, ctx: &mut BinderContext) -> Result<Expression> {
        match node {
            QueryNode::Constant { value, ty } => Self::bind_constant(value, ty.as_ref(), ctx),
            QueryNode::RangeVariable(variable) => ctx.resolve_range_variable(variable),
            QueryNode::Property { source, name, .. } => PropertyBinder::bind_property(node, source, name, ctx),
            QueryNode::OpenProperty { source, name } | QueryNode::CollectionOpenProperty { source, name } => {
                DynamicPropertyBinder::bind_open_property(source, name, ctx)
            }
            QueryNode::BinaryOperator { op, left, right } => BinaryBinder::bind(*op, left, right, ctx),
            QueryNode::UnaryOperator { op, operand } => Self::bind_unary(*op, operand, ctx),
            QueryNode::Convert { source, ty } => ConvertBinder::bind_convert(source, ty, ctx),
            QueryNode::FunctionCall { name, args } | QueryNode::ResourceFunctionCall { name, args } => {
                FunctionBinder::bind(name, args, ctx)
            }
            QueryNode::Any { source, range_variable, body } => {
                CollectionBinder::bind_any(source, range_variable, body.as_deref(), ctx)
            }
            QueryNode::All { source, range_variable, body } => {
                CollectionBinder::bind_all(source, range_variable, body, ctx)
            }
            QueryNode::In { left, right } => CollectionBinder::bind_in(left, right, ctx),
            QueryNode::Count { source, filter } => CollectionBinder::bind_count(source, filter.as_deref(), ctx),
            QueryNode::CollectionCast { source, ty } => CollectionBinder::bind_collection_cast(source, ty, ctx),
            QueryNode::ResourceCast { source, ty } => ConvertBinder::bind_resource_cast(source, ty, ctx),
            QueryNode::CollectionConstant { values, element_ty } => {
                CollectionBinder::bind_collection_constant(values, element_ty, ctx)
            }
            QueryNode::NamedFunctionParameter(_)
            | QueryNode::ParameterAlias(_)
            | QueryNode::EntitySet(_)
            | QueryNode::KeyLookup { .. }
            | QueryNode::SearchTerm(_) => Err(BinderError::unsupported(node.kind_name())),
        }
    }

    pub fn bind_constant(value: &Literal, ty: Option<&EdmTypeRef>, ctx: &mut BinderContext) -> Result<Expression> {
        let declared = ty.map(|t| ctx.resolve_host_type(t)).transpose()?;

        if let Literal::Enum { type_name, value } = value {
            let host = ctx.resolve_host_type(&EdmTypeRef::enumeration(type_name, false))?;
            let enum_type = host
                .as_enum()
                .ok_or_else(|| BinderError::TypeNotInModel(type_name.clone()))?;
            let parsed = enum_type.try_parse(value).ok_or_else(|| BinderError::InvalidEnumValue {
                enum_type: type_name.clone(),
                value: value.clone(),
            })?;
            let enum_value = Value::Enum { type_name: type_name.clone(), value: parsed };
            return Ok(ctx.constant_expression(enum_value, host));
        }

        let literal = value
            .to_value()
            .ok_or_else(|| BinderError::type_mismatch("primitive literal", format!("{value:?}")))?;
        if literal.is_null() {
            return Ok(Expression::null(&declared.unwrap_or(HostType::Object)));
        }
        let ty = literal.host_type().unwrap_or(HostType::Object);
        Ok(ctx.constant_expression(literal, ty))
    }

    /// Value of an inlined or captured literal.
    pub fn constant_value(expr: &Expression) -> Option<&Value> {
        match expr {
            Expression::Constant { value, .. } | Expression::Captured { value, .. } => Some(value),
            _ => None,
        }
    }

    fn bind_unary(op: UnaryOperatorKind, operand: &QueryNode, ctx: &mut BinderContext) -> Result<Expression> {
        let operand = Self::bind(operand, ctx)?;
        let ty = operand.ty();
        match op {
            UnaryOperatorKind::Not if ty.is_bool() => Ok(Expression::unary(UnaryOp::Not, operand)),
            UnaryOperatorKind::Not if ty.is_object() => Ok(Expression::unary(
                UnaryOp::Not,
                Expression::convert(operand, HostType::Bool.to_nullable()),
            )),
            UnaryOperatorKind::Negate if ty.is_numeric() || matches!(ty.non_nullable(), HostType::TimeSpan) => {
                Ok(Expression::unary(UnaryOp::Negate, operand))
            }
            UnaryOperatorKind::Not => Err(BinderError::type_mismatch(HostType::Bool, ty)),
            UnaryOperatorKind::Negate => Err(BinderError::type_mismatch("numeric", ty)),
        }
    }
}
