use tracing::trace;

use crate::{
    ast::{FilterClause, Literal, QueryNode, RangeVariable},
    binder::{BinderContext, FilterBinder, NullPropagation, QueryBinder},
    error::{BinderError, Result},
    expr::{convert_value, Expression, Lambda, Method, Parameter, Value},
    model::{EdmTypeRef, HostType},
};

/// Collection-valued operations: `any`, `all`, `in`, `$count`, collection
/// casts and literal collections.
pub struct CollectionBinder;

impl CollectionBinder {
    pub fn bind_any(
        source: &QueryNode,
        range_variable: &RangeVariable,
        body: Option<&QueryNode>,
        ctx: &mut BinderContext,
    ) -> Result<Expression> {
        let source = QueryBinder::bind(source, ctx)?;
        let element = Self::element_type(&source)?;
        let any = match body {
            None | Some(QueryNode::Constant { value: Literal::Bool(true), .. }) => {
                Expression::call(Method::Any, vec![source.clone()])
            }
            Some(body) => {
                let lambda = ctx.with_range_variable(&range_variable.name, element, |ctx, parameter| {
                    if matches!(body, QueryNode::Constant { value: Literal::Bool(false), .. }) {
                        return Ok(None);
                    }
                    Self::predicate(body, parameter, ctx).map(Some)
                })?;
                match lambda {
                    Some(lambda) => Expression::call(Method::Any, vec![source.clone(), Expression::lambda(lambda)]),
                    None => return Ok(Expression::bool(false)),
                }
            }
        };
        Ok(NullPropagation::guard_if_needed(&source, any, ctx))
    }

    pub fn bind_all(
        source: &QueryNode,
        range_variable: &RangeVariable,
        body: &QueryNode,
        ctx: &mut BinderContext,
    ) -> Result<Expression> {
        let source = QueryBinder::bind(source, ctx)?;
        let element = Self::element_type(&source)?;
        let lambda = ctx.with_range_variable(&range_variable.name, element, |ctx, parameter| {
            Self::predicate(body, parameter, ctx)
        })?;
        let all = Expression::call(Method::All, vec![source.clone(), Expression::lambda(lambda)]);
        Ok(NullPropagation::guard_if_needed(&source, all, ctx))
    }

    fn predicate(body: &QueryNode, parameter: &Parameter, ctx: &mut BinderContext) -> Result<Lambda> {
        let body = QueryBinder::bind(body, ctx)?;
        let body = NullPropagation::normalize_predicate(body, ctx)?;
        Ok(Lambda::new(parameter.clone(), body))
    }

    /// `left in right`: membership of a single value in a collection.
    pub fn bind_in(left: &QueryNode, right: &QueryNode, ctx: &mut BinderContext) -> Result<Expression> {
        let probe = QueryBinder::bind(left, ctx)?;
        let collection = QueryBinder::bind(right, ctx)?;
        let element = Self::element_type(&collection)?;

        let probe = if probe.is_null_constant() { Expression::null(&element) } else { probe };
        let probe_ty = probe.ty();
        let items = if probe_ty != element {
            Expression::call(Method::CastElements(probe_ty), vec![collection.clone()])
        } else {
            collection.clone()
        };
        let contains = Expression::call(Method::CollectionContains, vec![items, probe]);
        Ok(NullPropagation::guard_if_needed(&collection, contains, ctx))
    }

    /// `source/$count`, optionally over the items a nested filter keeps.
    pub fn bind_count(source: &QueryNode, filter: Option<&FilterClause>, ctx: &mut BinderContext) -> Result<Expression> {
        let source = QueryBinder::bind(source, ctx)?;
        let element = Self::element_type(&source)?;
        let counted = match filter {
            Some(clause) => {
                trace!("binding $count filter");
                let mut child = ctx.derive(element);
                let predicate = FilterBinder::bind(clause, &mut child);
                ctx.merge_captures(&child);
                Expression::call(Method::Where, vec![source.clone(), Expression::lambda(predicate?)])
            }
            None => source.clone(),
        };
        let count = Expression::call(Method::LongCount, vec![counted]);
        Ok(NullPropagation::guard_if_needed(&source, count, ctx))
    }

    pub fn bind_collection_cast(source: &QueryNode, ty: &EdmTypeRef, ctx: &mut BinderContext) -> Result<Expression> {
        let source = QueryBinder::bind(source, ctx)?;
        Self::element_type(&source)?;
        let target = match ctx.resolve_host_type(ty)? {
            HostType::Collection(element) => *element,
            element => element,
        };
        let cast = Expression::call(Method::CastElements(target), vec![source.clone()]);
        Ok(NullPropagation::guard_if_needed(&source, cast, ctx))
    }

    /// A literal list such as the right side of `in`, converted to its
    /// element type at bind time.
    pub fn bind_collection_constant(
        values: &[Literal],
        element_ty: &EdmTypeRef,
        ctx: &mut BinderContext,
    ) -> Result<Expression> {
        let element = ctx.resolve_host_type(element_ty)?;
        let mut items = Vec::with_capacity(values.len());
        for literal in values {
            items.push(Self::literal_value(literal, &element)?);
        }
        Ok(ctx.constant_expression(Value::collection(items), HostType::collection_of(element)))
    }

    fn literal_value(literal: &Literal, element: &HostType) -> Result<Value> {
        if let Some(enum_type) = element.as_enum() {
            let text = match literal {
                Literal::Enum { value, .. } | Literal::String(value) => value,
                Literal::Null => return Ok(Value::Null),
                other => return Err(BinderError::type_mismatch(element, format!("{other:?}"))),
            };
            let value = enum_type.try_parse(text).ok_or_else(|| BinderError::InvalidEnumValue {
                enum_type: enum_type.name.clone(),
                value: text.clone(),
            })?;
            return Ok(Value::Enum { type_name: enum_type.name.clone(), value });
        }
        let value = literal
            .to_value()
            .ok_or_else(|| BinderError::type_mismatch(element, format!("{literal:?}")))?;
        convert_value(value, &element.to_nullable()).map_err(|_| BinderError::type_mismatch(element, format!("{literal:?}")))
    }

    fn element_type(source: &Expression) -> Result<HostType> {
        match source.ty() {
            HostType::Collection(element) => Ok(*element),
            other => Err(BinderError::UnsupportedCollectionType(other.to_string())),
        }
    }
}
