use tracing::{debug, trace};

use crate::{
    ast::ComputeTransformationNode,
    binder::{BinderContext, QueryBinder},
    container::{ContainerSlot, Wrapper},
    error::Result,
    expr::{Expression, Lambda, Method},
};

/// Binds `compute(...)` to a projection that keeps the record and adds the
/// computed columns.
pub struct ComputeBinder;

impl ComputeBinder {
    /// `$it => new ComputeWrapper(Instance = $it, Model = @model, Container = {...})`.
    ///
    /// Columns bind in order and are registered in the context as they go,
    /// so a column can use the aliases declared before it. When any column
    /// fails, none of them stays registered.
    pub fn bind(transformation: &ComputeTransformationNode, ctx: &mut BinderContext) -> Result<Lambda> {
        let slots = ctx.all_or_nothing(|ctx| {
            let mut slots = Vec::with_capacity(transformation.expressions.len());
            for column in &transformation.expressions {
                trace!(alias = %column.alias, "bind computed column");
                let value = QueryBinder::bind(&column.expression, ctx)?;
                ctx.computed_properties.insert(column.alias.clone(), column.clone());
                slots.push((column.alias.clone(), value));
            }
            Ok(slots)
        })?;
        let container = ContainerSlot::from_pairs(slots).map(Expression::container);
        let wrapper = Wrapper::compute(ctx.current_expression(), ctx.model_expression(), container);
        let lambda = Lambda::new(ctx.current().clone(), Expression::wrapper(wrapper));
        debug!(columns = transformation.expressions.len(), "bound compute");
        Ok(lambda)
    }

    /// `source.Select(compute)`.
    pub fn apply(source: Expression, transformation: &ComputeTransformationNode, ctx: &mut BinderContext) -> Result<Expression> {
        let lambda = Self::bind(transformation, ctx)?;
        Ok(Expression::call(Method::Select, vec![source, Expression::lambda(lambda)]))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{BinaryOperatorKind, ComputeExpression, QueryNode},
        binder::_tests::{customer, customer_context, customer_type, customers, int, it},
        container::WrapperKind,
        error::BinderError,
        expr::{Interpreter, Value},
        model::HostType,
    };

    use super::*;

    fn compute(columns: Vec<ComputeExpression>) -> ComputeTransformationNode {
        ComputeTransformationNode { expressions: columns }
    }

    fn alias(name: &str) -> QueryNode {
        QueryNode::open_property(it(customer_type()), name)
    }

    #[test]
    fn wrapper_keeps_instance_and_captures_the_model() {
        let mut ctx = customer_context();
        let next = ComputeExpression::new(QueryNode::binary(BinaryOperatorKind::Add, customer("Rank"), int(1)), "Next");
        let lambda = ComputeBinder::bind(&compute(vec![next]), &mut ctx).unwrap();
        assert_eq!(lambda.return_type(), HostType::Wrapper(WrapperKind::Compute));
        assert_eq!(
            lambda.to_string(),
            "$it => new ComputeWrapper(Container = {Next = ($it.Rank + Convert(1, Int64))}, Instance = $it, Model = @model)"
        );
        assert!(ctx.computed_properties.contains_key("Next"));
    }

    #[test]
    fn later_columns_see_earlier_aliases() {
        let mut ctx = customer_context();
        let columns = compute(vec![
            ComputeExpression::new(QueryNode::binary(BinaryOperatorKind::Multiply, customer("Rank"), int(10)), "Tens"),
            ComputeExpression::new(QueryNode::binary(BinaryOperatorKind::Add, alias("Tens"), int(1)), "TensPlusOne"),
        ]);
        let expr =
            ComputeBinder::apply(Expression::constant(Value::collection(customers())), &columns, &mut ctx).unwrap();
        let Value::Collection(rows) = Interpreter::new().evaluate(&expr).unwrap() else { panic!("expected rows") };

        let columns: Vec<(Value, Value)> = rows
            .iter()
            .map(|row| {
                let Value::Wrapper(w) = row else { panic!("expected a compute wrapper, got {row}") };
                let Some(Value::Container(c)) = &w.container else { panic!("expected computed columns") };
                assert!(matches!(w.instance, Some(Value::Record(_))));
                assert!(matches!(w.model, Some(Value::Model(_))));
                (c.get("Tens").cloned().unwrap(), c.get("TensPlusOne").cloned().unwrap())
            })
            .collect();
        assert_eq!(
            columns,
            vec![
                (Value::Int64(30), Value::Int64(31)),
                (Value::Int64(10), Value::Int64(11)),
                (Value::Int64(20), Value::Int64(21)),
            ]
        );
    }

    #[test]
    fn failing_column_fails_the_whole_compute() {
        let mut ctx = customer_context();
        let columns = compute(vec![ComputeExpression::new(customer("Missing"), "M")]);
        assert!(matches!(ComputeBinder::bind(&columns, &mut ctx), Err(BinderError::PropertyNotFound { .. })));
        assert!(ctx.computed_properties.is_empty());
    }

    #[test]
    fn later_failure_unregisters_earlier_columns() {
        let mut ctx = customer_context();
        let columns = compute(vec![
            ComputeExpression::new(QueryNode::binary(BinaryOperatorKind::Add, customer("Rank"), int(1)), "Next"),
            ComputeExpression::new(customer("Missing"), "Bad"),
        ]);
        assert!(ComputeBinder::bind(&columns, &mut ctx).is_err());
        assert!(ctx.computed_properties.is_empty());

        // `Next` reads the open-property bag again, not the failed column
        let next = QueryBinder::bind(&alias("Next"), &mut ctx).unwrap();
        assert_eq!(next.ty(), HostType::Object);
    }
}
