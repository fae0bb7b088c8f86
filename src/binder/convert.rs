use crate::{
    ast::{Literal, QueryNode, RangeVariable, IT},
    binder::{BinderContext, QueryBinder},
    error::{BinderError, Result},
    expr::{Expression, Value},
    model::{EdmPrimitive, EdmTypeRef, HostType},
};

/// Conversions: `Convert` nodes, resource casts and the `cast`/`isof` functions.
pub struct ConvertBinder;

impl ConvertBinder {
    pub fn bind_convert(source: &QueryNode, ty: &EdmTypeRef, ctx: &mut BinderContext) -> Result<Expression> {
        let source = QueryBinder::bind(source, ctx)?;
        let target = ctx.resolve_host_type(ty)?;
        Self::convert(source, &target)
    }

    pub fn bind_resource_cast(source: &QueryNode, ty: &EdmTypeRef, ctx: &mut BinderContext) -> Result<Expression> {
        let source = QueryBinder::bind(source, ctx)?;
        let target = ctx.resolve_host_type(ty)?;
        Ok(Expression::type_as(source, target.non_nullable().clone()))
    }

    /// Change the static type of `source` to `target`.
    pub fn convert(source: Expression, target: &HostType) -> Result<Expression> {
        let ty = source.ty();
        if ty == *target || Self::is_identity(&ty, target) {
            return Ok(source);
        }
        if source.is_null_constant() {
            return Ok(Expression::null(target));
        }
        if target.is_object() {
            return Ok(Expression::convert(source, HostType::Object));
        }
        if let Some(enum_type) = target.as_enum() {
            return match QueryBinder::constant_value(&source) {
                Some(Value::String(text)) => {
                    let value = enum_type.try_parse(text).ok_or_else(|| BinderError::InvalidEnumValue {
                        enum_type: enum_type.name.clone(),
                        value: text.clone(),
                    })?;
                    Ok(Expression::typed_constant(
                        Value::Enum { type_name: enum_type.name.clone(), value },
                        target.non_nullable().clone(),
                    ))
                }
                _ if ty.as_enum() == Some(enum_type) => Ok(Expression::convert(source, target.clone())),
                _ => Err(BinderError::type_mismatch(target, ty)),
            };
        }
        if ty.is_object() {
            return Ok(Expression::convert(source, target.to_nullable()));
        }
        if ty.is_nullable_value_type() && !target.is_nullable() {
            // nullable source into a value type: keep null as null
            let nullable = target.to_nullable();
            return Ok(Expression::conditional(
                Expression::equal(source.clone(), Expression::null(&ty)),
                Expression::null(&nullable),
                Expression::convert(source, nullable),
            ));
        }
        Ok(Expression::convert(source, target.clone()))
    }

    /// Logical types the host represents identically.
    fn is_identity(source: &HostType, target: &HostType) -> bool {
        matches!(
            (source.non_nullable(), target.non_nullable()),
            (HostType::Date | HostType::DateTime, HostType::Date)
                | (HostType::DateTimeOffset | HostType::DateTime, HostType::DateTimeOffset)
                | (HostType::TimeOfDay | HostType::TimeSpan, HostType::TimeOfDay)
                | (HostType::TimeSpan, HostType::TimeSpan)
        ) && (source.is_nullable() == target.is_nullable() || source.is_nullable_value_type())
    }

    /// `cast(value, Type)`, `cast(Type)`, `isof(value, Type)` and `isof(Type)`.
    pub fn bind_type_function(name: &str, args: &[QueryNode], ctx: &mut BinderContext) -> Result<Expression> {
        let (source, type_arg) = match args {
            [type_arg] => (None, type_arg),
            [source, type_arg] => (Some(source), type_arg),
            _ => {
                return Err(BinderError::InvalidFunctionArguments {
                    name: name.to_string(),
                    reason: format!("expected 1 or 2 arguments, got {}", args.len()),
                })
            }
        };
        let target = Self::type_argument(name, type_arg, ctx)?;
        let source = match source {
            Some(source) => QueryBinder::bind(source, ctx)?,
            None => ctx.resolve_range_variable(&RangeVariable::new(IT, EdmTypeRef::untyped()))?,
        };
        if name.eq_ignore_ascii_case("isof") {
            Ok(Self::is_of(source, &target))
        } else {
            Ok(Self::cast(source, &target))
        }
    }

    /// Host type named by the qualified type-name literal of cast/isof.
    fn type_argument(name: &str, node: &QueryNode, ctx: &BinderContext) -> Result<HostType> {
        let invalid = |reason: String| BinderError::InvalidFunctionArguments { name: name.to_string(), reason };
        let type_name = match node {
            QueryNode::Constant { value: Literal::String(s), .. } => s.as_str(),
            other => return Err(invalid(format!("expected a type name, got {}", other.kind_name()))),
        };
        let candidates = match EdmPrimitive::from_name(type_name) {
            Some(primitive) => vec![EdmTypeRef::primitive(primitive, false)],
            None => vec![EdmTypeRef::enumeration(type_name, false), EdmTypeRef::entity(type_name)],
        };
        candidates
            .iter()
            .find_map(|candidate| ctx.model.resolve_host_type(candidate))
            .map(|ty| ty.non_nullable().clone())
            .ok_or_else(|| BinderError::TypeNotInModel(type_name.to_string()))
    }

    /// `cast`: the converted value, or null when `source` cannot be
    /// converted to `target`.
    fn cast(source: Expression, target: &HostType) -> Expression {
        let ty = source.ty();
        if source.is_null_constant() {
            return Expression::null(target);
        }
        if ty.non_nullable() == target {
            return source;
        }
        if ty.is_object() {
            let nullable = target.to_nullable();
            return Expression::conditional(
                Expression::type_is(source.clone(), target.clone()),
                Expression::convert(source, nullable.clone()),
                Expression::null(&nullable),
            );
        }
        if let Some(enum_type) = target.as_enum() {
            return match QueryBinder::constant_value(&source) {
                Some(Value::String(text)) => match enum_type.try_parse(text) {
                    Some(value) => Expression::typed_constant(
                        Value::Enum { type_name: enum_type.name.clone(), value },
                        target.clone(),
                    ),
                    None => Expression::null(target),
                },
                _ => Expression::null(target),
            };
        }
        if matches!(target, HostType::Record(_)) {
            return Expression::type_as(source, target.clone());
        }
        let convertible = (ty.is_numeric() && target.is_numeric())
            || (ty.as_enum().is_some() && target.is_integral())
            || Self::is_identity(&ty, target)
            || matches!(
                (ty.non_nullable(), target),
                (HostType::Date, HostType::DateTimeOffset) | (HostType::DateTimeOffset, HostType::Date)
            );
        if !convertible {
            return Expression::null(target);
        }
        if ty.is_nullable_value_type() {
            Expression::convert(source, target.to_nullable())
        } else {
            Expression::convert(source, target.clone())
        }
    }

    /// `isof`: a run-time type test of the value. A dynamic value of another
    /// type yields null, like `cast` does.
    fn is_of(source: Expression, target: &HostType) -> Expression {
        if source.is_null_constant() {
            return Expression::bool(false);
        }
        if source.ty().is_object() {
            let nullable = HostType::Bool.to_nullable();
            return Expression::conditional(
                Expression::type_is(source, target.clone()),
                Expression::typed_constant(Value::Bool(true), nullable.clone()),
                Expression::null(&nullable),
            );
        }
        Expression::type_is(source, target.clone())
    }
}
