use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::{AggregateExpressionBase, QueryNode, TransformationNode, IT},
    binder::{BinderContext, QueryBinder},
    container::{ContainerSlot, Wrapper, WrapperKind, CONTAINER},
    error::Result,
    expr::{Expression, Lambda, Method, Parameter},
    model::{HostMember, HostType},
};

/// Joins the segments of a property path in flattened-path keys.
pub const PATH_SEPARATOR: &str = "\\";

/// Pre-grouping projection that lifts navigation-reached aggregate inputs
/// into single-hop container slots.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatteningResult {
    /// `source.Select(flattening_lambda)`.
    pub flattened_source: Expression,
    pub flattening_lambda: Lambda,
    /// Original path (segments joined by [`PATH_SEPARATOR`]) to its slot read.
    pub flattened_properties: IndexMap<String, Expression>,
    /// Parameter over the flattening wrapper; the context's current parameter
    /// from here on.
    pub parameter: Parameter,
}

pub struct Flattener;

impl Flattener {
    /// Flatten the navigation paths the aggregates of `transformation` read.
    ///
    /// Returns `None`, leaving `ctx` untouched, when there is nothing to do: no
    /// grouping properties, only `$count` aggregates, no path crossing a
    /// navigation property, or a context that is already flattened.
    pub fn flatten(
        transformation: &TransformationNode,
        source: &Expression,
        ctx: &mut BinderContext,
    ) -> Result<Option<FlatteningResult>> {
        if ctx.is_flattened() || !ctx.flattened_properties.is_empty() {
            debug!("flattening skipped: context already flattened");
            return Ok(None);
        }
        let aggregates = transformation.aggregate_expressions();
        if transformation.grouping_properties().is_empty() || aggregates.iter().all(AggregateExpressionBase::is_count)
        {
            debug!("flattening skipped: nothing to group or aggregate");
            return Ok(None);
        }

        let paths = Self::navigation_paths(aggregates);
        if paths.is_empty() {
            debug!("flattening skipped: no navigation paths");
            return Ok(None);
        }

        let mut bound = Vec::with_capacity(paths.len());
        for (key, node) in &paths {
            bound.push((key.clone(), QueryBinder::bind(node, ctx)?));
        }

        // last declared path is the outermost slot
        let named: Vec<(String, String, Expression)> = bound
            .into_iter()
            .rev()
            .enumerate()
            .map(|(i, (key, expr))| (key, format!("Property{i}"), expr))
            .collect();

        let slots = named.iter().map(|(_, name, expr)| (name.clone(), expr.clone()));
        let chain = ContainerSlot::from_pairs(slots.collect::<Vec<_>>())
            .map(Expression::container)
            .unwrap_or_else(|| Expression::null(&HostType::Container));
        let wrapper = Expression::wrapper(Wrapper::flattening(ctx.current_expression(), chain));
        let flattening_lambda = Lambda::new(ctx.current().clone(), wrapper);

        let wrapper_ty = HostType::Wrapper(WrapperKind::Flattening);
        let parameter = Parameter::new(IT, wrapper_ty.clone());
        let container = Expression::member(
            Expression::parameter(&parameter),
            HostMember::new(&wrapper_ty.to_string(), CONTAINER, HostType::Container),
        );
        let flattened_properties: IndexMap<String, Expression> = named
            .into_iter()
            .map(|(key, name, expr)| {
                let read = Expression::slot(container.clone(), &name, expr.ty());
                (key, read)
            })
            .collect();

        let flattened_source =
            Expression::call(Method::Select, vec![source.clone(), Expression::lambda(flattening_lambda.clone())]);
        ctx.enter_flattening(parameter.clone(), flattened_properties.clone());
        debug!(paths = flattened_properties.len(), "flattening applied");

        Ok(Some(FlatteningResult { flattened_source, flattening_lambda, flattened_properties, parameter }))
    }

    /// Distinct navigation-crossing paths read by property aggregates, in
    /// declaration order.
    fn navigation_paths(aggregates: &[AggregateExpressionBase]) -> IndexMap<String, QueryNode> {
        let mut paths = IndexMap::new();
        for aggregate in aggregates {
            let AggregateExpressionBase::Property(property) = aggregate else { continue };
            let Some(node) = property.expression.as_ref() else { continue };
            if !node.crosses_navigation() {
                continue;
            }
            if let Some(path) = node.property_path() {
                paths.entry(path.join(PATH_SEPARATOR)).or_insert_with(|| node.clone());
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{AggregateExpression, AggregateTransformationNode, AggregationMethod, GroupByPropertyNode,
              GroupByTransformationNode},
        binder::_tests::{sale, sale_context, sales},
        expr::{Interpreter, Value},
    };

    use super::*;

    fn group_by_region(aggregates: Vec<AggregateExpression>) -> TransformationNode {
        TransformationNode::GroupBy(GroupByTransformationNode {
            grouping_properties: vec![GroupByPropertyNode::leaf("Region", sale("Region"))],
            child: Some(AggregateTransformationNode {
                expressions: aggregates.into_iter().map(AggregateExpressionBase::Property).collect(),
            }),
        })
    }

    fn source() -> Expression {
        Expression::constant(Value::collection(sales()))
    }

    #[test]
    fn last_declared_path_is_the_outermost_slot() {
        let mut ctx = sale_context();
        let transformation = group_by_region(vec![
            AggregateExpression::new(sale("Product/Price"), AggregationMethod::Sum, "Total"),
            AggregateExpression::new(sale("Product/Weight"), AggregationMethod::Max, "Heaviest"),
            AggregateExpression::new(sale("Product/Price"), AggregationMethod::Min, "Cheapest"),
        ]);
        let result = Flattener::flatten(&transformation, &source(), &mut ctx).unwrap().unwrap();

        let keys: Vec<&str> = result.flattened_properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Product\\Weight", "Product\\Price"]);
        match &*result.flattening_lambda.body {
            Expression::Wrapper(w) => match w.container.as_ref() {
                Some(Expression::Container(chain)) => {
                    assert_eq!(chain.names(), vec!["Property0", "Property1"]);
                    assert!(chain.value.to_string().contains("$it.Product.Weight"));
                }
                other => panic!("expected a container, got {other:?}"),
            },
            other => panic!("expected a wrapper, got {other}"),
        }
        assert!(ctx.is_flattened());
        assert_eq!(ctx.current(), &result.parameter);
        assert_eq!(result.flattened_properties["Product\\Price"].ty(), HostType::Double.to_nullable());
    }

    #[test]
    fn flattening_twice_is_a_no_op() {
        let mut ctx = sale_context();
        let transformation =
            group_by_region(vec![AggregateExpression::new(sale("Product/Price"), AggregationMethod::Sum, "Total")]);
        assert!(Flattener::flatten(&transformation, &source(), &mut ctx).unwrap().is_some());
        let before = ctx.flattened_properties.clone();
        assert_eq!(Flattener::flatten(&transformation, &source(), &mut ctx).unwrap(), None);
        assert_eq!(ctx.flattened_properties, before);
    }

    #[test]
    fn nothing_to_flatten() {
        let mut ctx = sale_context();
        let local = group_by_region(vec![AggregateExpression::new(sale("Amount"), AggregationMethod::Sum, "Total")]);
        assert_eq!(Flattener::flatten(&local, &source(), &mut ctx).unwrap(), None);

        let counts = group_by_region(vec![AggregateExpression::count("Count")]);
        assert_eq!(Flattener::flatten(&counts, &source(), &mut ctx).unwrap(), None);

        let ungrouped = TransformationNode::Aggregate(AggregateTransformationNode {
            expressions: vec![AggregateExpressionBase::Property(AggregateExpression::new(
                sale("Product/Price"),
                AggregationMethod::Sum,
                "Total",
            ))],
        });
        assert_eq!(Flattener::flatten(&ungrouped, &source(), &mut ctx).unwrap(), None);
        assert!(!ctx.is_flattened());
    }

    #[test]
    fn flattened_rows_keep_the_source_record() {
        let mut ctx = sale_context();
        let transformation =
            group_by_region(vec![AggregateExpression::new(sale("Product/Price"), AggregationMethod::Sum, "Total")]);
        let result = Flattener::flatten(&transformation, &source(), &mut ctx).unwrap().unwrap();

        let rows = match Interpreter::new().evaluate(&result.flattened_source).unwrap() {
            Value::Collection(rows) => rows,
            other => panic!("expected rows, got {other}"),
        };
        let read = Lambda::new(result.parameter.clone(), result.flattened_properties["Product\\Price"].clone());
        let prices: Vec<Value> = rows.iter().map(|r| Interpreter::invoke(&read, r.clone()).unwrap()).collect();
        assert_eq!(prices, vec![Value::double(1.5), Value::double(3.0), Value::double(1.5)]);

        // grouping properties read through the source back-reference
        let region = QueryBinder::bind(&sale("Region"), &mut ctx).unwrap();
        assert_eq!(region.to_string(), "$it.Source.Region");
    }
}
