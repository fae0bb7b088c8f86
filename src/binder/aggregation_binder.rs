use tracing::{debug, trace};

use crate::{
    ast::{
        AggregateExpression, AggregateExpressionBase, AggregationMethod, EntitySetAggregateExpression,
        GroupByPropertyNode, TransformationNode, IT,
    },
    binder::{BinderContext, Flattener, QueryBinder},
    container::{ContainerSlot, Wrapper, WrapperKind, GROUP_BY_CONTAINER, KEY},
    error::{BinderError, Result},
    expr::{
        aggregates::{averaging_result_type, has_summation_operator},
        Expression, Lambda, Method, Parameter,
    },
    model::{HostMember, HostType},
};

/// Binds `groupby`/`aggregate` transformations to a key selector and a
/// result selector over the groups it produces.
pub struct AggregationBinder;

impl AggregationBinder {
    /// Key selector and result selector of `transformation`.
    pub fn bind(transformation: &TransformationNode, ctx: &mut BinderContext) -> Result<(Lambda, Lambda)> {
        match transformation {
            TransformationNode::GroupBy(_) | TransformationNode::Aggregate(_) => {}
            other => return Err(BinderError::unsupported(other.kind_name())),
        }
        let key = Self::bind_group_key(transformation, ctx)?;
        let result = Self::bind_result(transformation, ctx)?;
        debug!(key = %key, result = %result, "bound aggregation");
        Ok((key, result))
    }

    /// `source.GroupBy(key).Select(result)`, over the flattened source when
    /// the aggregates read through navigation properties. A failure leaves
    /// `ctx` unflattened.
    pub fn apply(source: Expression, transformation: &TransformationNode, ctx: &mut BinderContext) -> Result<Expression> {
        ctx.all_or_nothing(|ctx| {
            let source = match Flattener::flatten(transformation, &source, ctx)? {
                Some(flattening) => flattening.flattened_source,
                None => source,
            };
            let (key, result) = Self::bind(transformation, ctx)?;
            let grouped = Expression::call(Method::GroupBy, vec![source, Expression::lambda(key)]);
            Ok(Expression::call(Method::Select, vec![grouped, Expression::lambda(result)]))
        })
    }

    /// `$it => new GroupByWrapper(GroupByContainer = {...})`, or the
    /// no-grouping sentinel when nothing is grouped.
    pub fn bind_group_key(transformation: &TransformationNode, ctx: &mut BinderContext) -> Result<Lambda> {
        let properties = transformation.grouping_properties();
        trace!(properties = properties.len(), "bind group key");
        let body = if properties.is_empty() {
            Expression::wrapper(Wrapper::no_group_by())
        } else {
            Expression::wrapper(Wrapper::group_by(Self::grouping_container(properties, ctx)?))
        };
        Ok(Lambda::new(ctx.current().clone(), body))
    }

    fn grouping_container(properties: &[GroupByPropertyNode], ctx: &mut BinderContext) -> Result<Expression> {
        let mut slots = Vec::with_capacity(properties.len());
        for property in properties {
            let value = match (&property.expression, property.children.is_empty()) {
                (Some(expression), true) => QueryBinder::bind(expression, ctx)?,
                (_, false) => Expression::wrapper(Wrapper::group_by(Self::grouping_container(&property.children, ctx)?)),
                (None, true) => return Err(BinderError::ArgumentNull("grouping property expression")),
            };
            slots.push((property.name.clone(), value));
        }
        ContainerSlot::from_pairs(slots)
            .map(Expression::container)
            .ok_or(BinderError::ArgumentNull("grouping properties"))
    }

    /// `$it => new AggregationWrapper(GroupByContainer = $it.Key.GroupByContainer, Container = {...})`
    /// over one group.
    pub fn bind_result(transformation: &TransformationNode, ctx: &mut BinderContext) -> Result<Lambda> {
        let grouped = !transformation.grouping_properties().is_empty();
        let key_ty = HostType::Wrapper(if grouped { WrapperKind::GroupBy } else { WrapperKind::NoGroupBy });
        let group = Parameter::new(IT, HostType::grouping_of(key_ty.clone(), ctx.element_type().clone()));

        let group_by_container = grouped.then(|| {
            let key = Expression::member(
                Expression::parameter(&group),
                HostMember::new(&group.ty.to_string(), KEY, key_ty.clone()),
            );
            Expression::member(key, HostMember::new(&key_ty.to_string(), GROUP_BY_CONTAINER, HostType::Container))
        });
        let container =
            Self::aggregate_container(transformation.aggregate_expressions(), &Expression::parameter(&group), ctx)?;

        Ok(Lambda::new(group, Expression::wrapper(Wrapper::aggregation(container, group_by_container))))
    }

    /// One slot per aggregate, named by its alias; `None` without aggregates.
    fn aggregate_container(
        aggregates: &[AggregateExpressionBase],
        group: &Expression,
        ctx: &mut BinderContext,
    ) -> Result<Option<Expression>> {
        let mut slots = Vec::with_capacity(aggregates.len());
        for aggregate in aggregates {
            let value = match aggregate {
                AggregateExpressionBase::Property(property) => Self::bind_property_aggregate(property, group, ctx)?,
                AggregateExpressionBase::EntitySet(entity_set) => Self::bind_entity_set_aggregate(entity_set, group, ctx)?,
            };
            slots.push((aggregate.alias().to_string(), value));
        }
        Ok(ContainerSlot::from_pairs(slots).map(Expression::container))
    }

    fn bind_property_aggregate(
        aggregate: &AggregateExpression,
        group: &Expression,
        ctx: &mut BinderContext,
    ) -> Result<Expression> {
        trace!(method = %aggregate.method, alias = %aggregate.alias, "bind aggregate");
        let parameter = ctx.current().clone();
        let select = |body: Expression| Expression::lambda(Lambda::new(parameter.clone(), body));

        match &aggregate.method {
            // no property to select
            AggregationMethod::VirtualPropertyCount => Ok(Expression::call(Method::LongCount, vec![group.clone()])),
            AggregationMethod::CountDistinct => {
                let body = Self::aggregated_value(aggregate, ctx)?;
                let values = Expression::call(Method::Select, vec![group.clone(), select(body)]);
                let distinct = Expression::call(Method::Distinct, vec![values]);
                Ok(Expression::call(Method::LongCount, vec![distinct]))
            }
            AggregationMethod::Sum | AggregationMethod::Average => {
                let method = if aggregate.method == AggregationMethod::Sum { Method::Sum } else { Method::Average };
                let body = Self::aggregated_value(aggregate, ctx)?;
                let dynamic = body.ty().is_object();
                // dynamic values have no static type to pick an operator from
                let body = if dynamic {
                    Expression::convert(body, HostType::Decimal.to_nullable())
                } else {
                    Self::widen_small_integral(body)
                };
                let ty = body.ty();
                let supported = match method {
                    Method::Sum => has_summation_operator(&ty),
                    _ => averaging_result_type(&ty).is_some(),
                };
                if !supported {
                    return Err(BinderError::AggregationNotSupportedForType {
                        method: aggregate.method.to_string(),
                        ty: ty.to_string(),
                    });
                }
                let call = Expression::call(method, vec![group.clone(), select(body)]);
                Ok(if dynamic { Expression::convert(call, HostType::Object) } else { call })
            }
            AggregationMethod::Min | AggregationMethod::Max => {
                let body = Self::aggregated_value(aggregate, ctx)?;
                let ty = body.ty();
                if matches!(
                    ty,
                    HostType::Collection(_)
                        | HostType::Grouping { .. }
                        | HostType::Record(_)
                        | HostType::Dictionary
                        | HostType::Container
                        | HostType::Wrapper(_)
                        | HostType::Model
                ) {
                    return Err(BinderError::AggregationNotSupportedForType {
                        method: aggregate.method.to_string(),
                        ty: ty.to_string(),
                    });
                }
                let method = if aggregate.method == AggregationMethod::Min { Method::Min } else { Method::Max };
                Ok(Expression::call(method, vec![group.clone(), select(body)]))
            }
            AggregationMethod::Custom(label) => {
                let body = Self::aggregated_value(aggregate, ctx)?;
                let ty = body.ty();
                let method = ctx.model.custom_aggregate_method(label, &ty).ok_or_else(|| {
                    BinderError::AggregationNotSupported {
                        method: label.clone(),
                        expression: body.to_string(),
                        ty: ty.to_string(),
                    }
                })?;
                Ok(Expression::call(Method::Custom(method), vec![group.clone(), select(body)]))
            }
        }
    }

    /// The bound property an aggregate reads.
    fn aggregated_value(aggregate: &AggregateExpression, ctx: &mut BinderContext) -> Result<Expression> {
        let expression = aggregate.expression.as_ref().ok_or(BinderError::ArgumentNull("aggregate expression"))?;
        QueryBinder::bind(expression, ctx)
    }

    /// Aggregates over a related collection of every record in the group:
    /// `group.SelectMany(nav).GroupBy(_ => no key).Select(g => new AggregationWrapper(...)).ToList()`.
    fn bind_entity_set_aggregate(
        aggregate: &EntitySetAggregateExpression,
        group: &Expression,
        ctx: &mut BinderContext,
    ) -> Result<Expression> {
        trace!(alias = %aggregate.alias, "bind entity set aggregate");
        let navigation = QueryBinder::bind(&aggregate.expression, ctx)?;
        let navigation_ty = navigation.ty();
        let element = navigation_ty
            .element_type()
            .cloned()
            .ok_or_else(|| BinderError::UnsupportedCollectionType(navigation_ty.to_string()))?;
        let related = Expression::call(
            Method::SelectMany,
            vec![group.clone(), Expression::lambda(Lambda::new(ctx.current().clone(), navigation))],
        );

        let mut inner = ctx.derive(element.clone());
        let key = Lambda::new(inner.current().clone(), Expression::wrapper(Wrapper::no_group_by()));
        let grouped = Expression::call(Method::GroupBy, vec![related, Expression::lambda(key)]);

        let inner_group =
            Parameter::new(IT, HostType::grouping_of(HostType::Wrapper(WrapperKind::NoGroupBy), element));
        let container = Self::aggregate_container(&aggregate.children, &Expression::parameter(&inner_group), &mut inner);
        ctx.merge_captures(&inner);
        let result = Lambda::new(inner_group, Expression::wrapper(Wrapper::aggregation(container?, None)));

        let selected = Expression::call(Method::Select, vec![grouped, Expression::lambda(result)]);
        Ok(Expression::call(Method::ToList, vec![selected]))
    }

    /// Integers narrower than `Int32` have no summation operator of their own.
    fn widen_small_integral(body: Expression) -> Expression {
        let ty = body.ty();
        if !matches!(ty.non_nullable(), HostType::SByte | HostType::Byte | HostType::Int16 | HostType::UInt16) {
            return body;
        }
        let target = if ty.is_nullable_value_type() { HostType::Int32.to_nullable() } else { HostType::Int32 };
        Expression::convert(body, target)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{AggregateTransformationNode, GroupByTransformationNode, QueryNode},
        binder::_tests::{customer_context, customer_type, customers, it, sale, sale_context, sale_type, sales},
        container::ContainerSlot,
        expr::{Interpreter, Value},
    };

    use super::*;

    fn group_by(properties: Vec<GroupByPropertyNode>, aggregates: Vec<AggregateExpressionBase>) -> TransformationNode {
        TransformationNode::GroupBy(GroupByTransformationNode {
            grouping_properties: properties,
            child: Some(AggregateTransformationNode { expressions: aggregates }),
        })
    }

    fn aggregate(node: QueryNode, method: AggregationMethod, alias: &str) -> AggregateExpressionBase {
        AggregateExpressionBase::Property(AggregateExpression::new(node, method, alias))
    }

    fn chain(expr: &Expression) -> &ContainerSlot<Expression> {
        match expr {
            Expression::Container(chain) => chain,
            other => panic!("expected a container, got {other}"),
        }
    }

    fn wrapper(lambda: &Lambda) -> &Wrapper<Expression> {
        match &*lambda.body {
            Expression::Wrapper(w) => w,
            other => panic!("expected a wrapper, got {other}"),
        }
    }

    /// `(grouping slot, aggregate slot)` of every result row.
    fn rows(source: Vec<Value>, transformation: &TransformationNode, ctx: &mut BinderContext, by: &str, alias: &str) -> Vec<(Value, Value)> {
        let expr = AggregationBinder::apply(Expression::constant(Value::collection(source)), transformation, ctx).unwrap();
        let Value::Collection(rows) = Interpreter::new().evaluate(&expr).unwrap() else { panic!("expected rows") };
        rows.iter()
            .map(|row| {
                let Value::Wrapper(w) = row else { panic!("expected a wrapper row, got {row}") };
                let slot = |c: &Option<Value>, name: &str| match c {
                    Some(Value::Container(c)) => c.get(name).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                (slot(&w.group_by_container, by), slot(&w.container, alias))
            })
            .collect()
    }

    #[test]
    fn key_and_result_chains_follow_declaration() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region")), GroupByPropertyNode::leaf("Year", sale("Year"))],
            vec![aggregate(sale("Amount"), AggregationMethod::Sum, "S")],
        );
        let (key, result) = AggregationBinder::bind(&transformation, &mut ctx).unwrap();

        let key_wrapper = wrapper(&key);
        assert_eq!(key_wrapper.kind, WrapperKind::GroupBy);
        assert_eq!(chain(key_wrapper.group_by_container.as_ref().unwrap()).names(), vec!["Region", "Year"]);

        let result_wrapper = wrapper(&result);
        assert_eq!(chain(result_wrapper.container.as_ref().unwrap()).names(), vec!["S"]);
        assert_eq!(result_wrapper.group_by_container.as_ref().unwrap().to_string(), "$it.Key.GroupByContainer");
        assert_eq!(
            result.parameter().unwrap().ty,
            HostType::grouping_of(HostType::Wrapper(WrapperKind::GroupBy), HostType::record("NS.Sale"))
        );
    }

    #[test]
    fn nested_grouping_properties_build_nested_wrappers() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::nested("Product", vec![GroupByPropertyNode::leaf("Name", sale("Product/Name"))])],
            vec![],
        );
        let key = AggregationBinder::bind_group_key(&transformation, &mut ctx).unwrap();
        let outer = chain(wrapper(&key).group_by_container.as_ref().unwrap());
        assert_eq!(outer.names(), vec!["Product"]);
        match &outer.value {
            Expression::Wrapper(inner) => {
                assert_eq!(inner.kind, WrapperKind::GroupBy);
                assert_eq!(chain(inner.group_by_container.as_ref().unwrap()).names(), vec!["Name"]);
            }
            other => panic!("expected a nested wrapper, got {other}"),
        }

        let empty = group_by(vec![GroupByPropertyNode { name: "X".into(), expression: None, children: vec![] }], vec![]);
        assert!(matches!(
            AggregationBinder::bind_group_key(&empty, &mut ctx),
            Err(BinderError::ArgumentNull(_))
        ));
    }

    #[test]
    fn plain_aggregate_uses_the_sentinel_key() {
        let mut ctx = customer_context();
        let transformation = TransformationNode::Aggregate(AggregateTransformationNode {
            expressions: vec![AggregateExpressionBase::Property(AggregateExpression::count("Count"))],
        });
        let (key, result) = AggregationBinder::bind(&transformation, &mut ctx).unwrap();
        assert_eq!(wrapper(&key).kind, WrapperKind::NoGroupBy);
        assert!(wrapper(&result).group_by_container.is_none());
        // count never binds a selector
        assert_eq!(
            chain(wrapper(&result).container.as_ref().unwrap()).value.to_string(),
            "$it.LongCount()"
        );
        assert_eq!(rows(customers(), &transformation, &mut ctx, "-", "Count"), vec![(Value::Null, Value::Int64(3))]);
    }

    #[test]
    fn sums_per_region() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![aggregate(sale("Amount"), AggregationMethod::Sum, "Total")],
        );
        assert_eq!(
            rows(sales(), &transformation, &mut ctx, "Region", "Total"),
            vec![
                (Value::string("North"), Value::decimal(30.0)),
                (Value::string("South"), Value::decimal(5.0)),
            ]
        );
    }

    #[test]
    fn small_integers_are_summed_as_int32() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![aggregate(sale("Quantity"), AggregationMethod::Sum, "Units")],
        );
        assert_eq!(
            rows(sales(), &transformation, &mut ctx, "Region", "Units"),
            vec![(Value::string("North"), Value::Int32(3)), (Value::string("South"), Value::Int32(3))]
        );
    }

    #[test]
    fn average_of_dynamic_value_goes_through_decimal() {
        let mut ctx = sale_context();
        let price = QueryNode::open_property(it(sale_type()), "Price");
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![aggregate(price.clone(), AggregationMethod::Average, "AvgPrice")],
        );
        let result = AggregationBinder::bind_result(&transformation, &mut ctx).unwrap();
        let slot = &chain(wrapper(&result).container.as_ref().unwrap()).value;
        match slot {
            Expression::Convert { operand, ty: HostType::Object } => match operand.as_ref() {
                Expression::Call { method: Method::Average, args, .. } => match &args[1] {
                    Expression::Lambda(l) => assert_eq!(l.return_type(), HostType::Decimal.to_nullable()),
                    other => panic!("expected a selector, got {other}"),
                },
                other => panic!("expected an average, got {other}"),
            },
            other => panic!("expected a conversion back to object, got {other}"),
        }

        let mut ctx = sale_context();
        assert_eq!(
            rows(sales(), &transformation, &mut ctx, "Region", "AvgPrice"),
            vec![(Value::string("North"), Value::decimal(5.0)), (Value::string("South"), Value::decimal(5.0))]
        );
    }

    #[test]
    fn count_distinct_min_and_max() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![aggregate(sale("Year"), AggregationMethod::CountDistinct, "Years")],
        );
        assert_eq!(
            rows(sales(), &transformation, &mut ctx, "Region", "Years"),
            vec![(Value::string("North"), Value::Int64(2)), (Value::string("South"), Value::Int64(1))]
        );

        let mut ctx = sale_context();
        let latest = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![aggregate(sale("Year"), AggregationMethod::Max, "Latest")],
        );
        assert_eq!(
            rows(sales(), &latest, &mut ctx, "Region", "Latest"),
            vec![(Value::string("North"), Value::Int32(2024)), (Value::string("South"), Value::Int32(2023))]
        );
    }

    #[test]
    fn custom_aggregates_resolve_through_the_model() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![aggregate(sale("Amount"), AggregationMethod::Custom("Custom.Total".into()), "Total")],
        );
        assert_eq!(
            rows(sales(), &transformation, &mut ctx, "Region", "Total"),
            vec![(Value::string("North"), Value::decimal(30.0)), (Value::string("South"), Value::decimal(5.0))]
        );

        let unknown = group_by(vec![], vec![aggregate(sale("Amount"), AggregationMethod::Custom("Custom.Nope".into()), "X")]);
        let err = AggregationBinder::bind(&unknown, &mut sale_context()).unwrap_err();
        assert_eq!(
            err,
            BinderError::AggregationNotSupported {
                method: "Custom.Nope".into(),
                expression: "$it.Amount".into(),
                ty: HostType::Decimal.to_string(),
            }
        );
    }

    #[test]
    fn sum_of_a_string_is_rejected() {
        let mut ctx = sale_context();
        let transformation = group_by(vec![], vec![aggregate(sale("Region"), AggregationMethod::Sum, "X")]);
        assert_eq!(
            AggregationBinder::bind(&transformation, &mut ctx).unwrap_err(),
            BinderError::AggregationNotSupportedForType { method: "sum".into(), ty: "String".into() }
        );
    }

    #[test]
    fn navigation_aggregates_read_flattened_slots() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![aggregate(sale("Product/Price"), AggregationMethod::Sum, "Spent")],
        );
        let expr =
            AggregationBinder::apply(Expression::constant(Value::collection(sales())), &transformation, &mut ctx).unwrap();
        assert!(ctx.is_flattened());
        assert!(expr.to_string().contains("[Property0]"));

        let mut ctx = sale_context();
        assert_eq!(
            rows(sales(), &transformation, &mut ctx, "Region", "Spent"),
            vec![(Value::string("North"), Value::double(4.5)), (Value::string("South"), Value::double(1.5))]
        );
    }

    #[test]
    fn failed_apply_leaves_the_context_unflattened() {
        let mut ctx = sale_context();
        let transformation = group_by(
            vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            vec![
                aggregate(sale("Product/Price"), AggregationMethod::Sum, "Spent"),
                aggregate(sale("Region"), AggregationMethod::Sum, "Bad"),
            ],
        );
        let source = Expression::constant(Value::collection(sales()));
        assert_eq!(
            AggregationBinder::apply(source, &transformation, &mut ctx).unwrap_err(),
            BinderError::AggregationNotSupportedForType { method: "sum".into(), ty: "String".into() }
        );
        assert!(!ctx.is_flattened());
        assert!(ctx.flattened_properties.is_empty());
        assert_eq!(QueryBinder::bind(&sale("Region"), &mut ctx).unwrap().to_string(), "$it.Region");
    }

    #[test]
    fn entity_set_aggregates_run_an_inner_pipeline() {
        let mut ctx = customer_context();
        let order = || it(crate::model::EdmTypeRef::entity("NS.Order"));
        let transformation = TransformationNode::Aggregate(AggregateTransformationNode {
            expressions: vec![AggregateExpressionBase::EntitySet(EntitySetAggregateExpression {
                expression: QueryNode::collection_navigation(it(customer_type()), "Orders"),
                alias: "Orders".into(),
                children: vec![
                    aggregate(QueryNode::property(order(), "Amount"), AggregationMethod::Sum, "Total"),
                    AggregateExpressionBase::Property(AggregateExpression::count("Count")),
                ],
            })],
        });
        let result = rows(customers(), &transformation, &mut ctx, "-", "Orders");
        let [(_, Value::Collection(inner))] = result.as_slice() else { panic!("expected one row, got {result:?}") };
        let [Value::Wrapper(w)] = inner.as_slice() else { panic!("expected one inner group, got {inner:?}") };
        let Some(Value::Container(c)) = &w.container else { panic!("expected an inner container") };
        assert_eq!(c.get("Total"), Some(&Value::decimal(14.75)));
        assert_eq!(c.get("Count"), Some(&Value::Int64(3)));
    }

    #[test]
    fn filters_are_not_aggregations() {
        let mut ctx = customer_context();
        let filter = TransformationNode::Filter(crate::ast::FilterClause::new(
            QueryNode::constant(crate::ast::Literal::Bool(true)),
            crate::ast::RangeVariable::it(customer_type()),
        ));
        assert_eq!(
            AggregationBinder::bind(&filter, &mut ctx).unwrap_err(),
            BinderError::UnsupportedNodeKind("Filter".into())
        );
    }
}
