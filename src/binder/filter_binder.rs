use tracing::{debug, trace};

use crate::{
    ast::FilterClause,
    binder::{BinderContext, NullPropagation, QueryBinder},
    error::{BinderError, Result},
    expr::{Expression, Lambda, Method},
    model::HostType,
};

/// Binds `$filter` clauses to `Bool` predicates.
pub struct FilterBinder;

impl FilterBinder {
    pub fn bind(clause: &FilterClause, ctx: &mut BinderContext) -> Result<Lambda> {
        trace!(variable = %clause.range_variable.name, "bind filter");
        let body = QueryBinder::bind(&clause.expression, ctx)?;
        let body = NullPropagation::normalize_predicate(body, ctx)?;
        let ty = body.ty();
        if ty != HostType::Bool {
            return Err(BinderError::type_mismatch(HostType::Bool, ty));
        }
        let predicate = Lambda::new(ctx.current().clone(), body);
        debug!(%predicate, "bound filter");
        Ok(predicate)
    }

    /// `source.Where(predicate)`.
    pub fn apply(source: Expression, clause: &FilterClause, ctx: &mut BinderContext) -> Result<Expression> {
        let predicate = Self::bind(clause, ctx)?;
        Ok(Expression::call(Method::Where, vec![source, Expression::lambda(predicate)]))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{BinaryOperatorKind, QueryNode, RangeVariable},
        binder::{
            _tests::{context_for, customer, customer_context, customer_type, customers, int, kept_ids, string},
            BinderSettings,
        },
        expr::{Interpreter, Value},
    };

    use super::*;

    fn clause(node: QueryNode) -> FilterClause {
        FilterClause::new(node, RangeVariable::it(customer_type()))
    }

    #[test]
    fn name_equality_is_false_for_null_names() {
        let mut ctx = customer_context();
        let sam = clause(QueryNode::binary(BinaryOperatorKind::Equal, customer("Name"), string("Sam")));
        let predicate = FilterBinder::bind(&sam, &mut ctx).unwrap();
        assert_eq!(predicate.return_type(), HostType::Bool);
        let results: Vec<Value> =
            customers().into_iter().map(|c| Interpreter::invoke(&predicate, c).unwrap()).collect();
        assert_eq!(results, vec![Value::Bool(true), Value::Bool(false), Value::Bool(false)]);
    }

    #[test]
    fn lifted_bodies_fold_unknown_to_false() {
        let mut ctx = customer_context();
        let old = clause(QueryNode::binary(BinaryOperatorKind::GreaterThan, customer("Age"), int(35)));
        let predicate = FilterBinder::bind(&old, &mut ctx).unwrap();
        assert!(predicate.to_string().contains("== true"));
        assert_eq!(kept_ids(&predicate, &customers()), vec![3]);

        let mut strict = context_for(&customer_type(), BinderSettings::without_null_propagation());
        let predicate = FilterBinder::bind(&old, &mut strict).unwrap();
        assert!(matches!(*predicate.body, Expression::Binary { .. } | Expression::Convert { .. }));
        assert_eq!(predicate.return_type(), HostType::Bool);
    }

    #[test]
    fn non_boolean_bodies_are_rejected() {
        let mut ctx = customer_context();
        let rank = FilterBinder::bind(&clause(customer("Rank")), &mut ctx);
        assert!(matches!(rank, Err(BinderError::TypeMismatch { .. })));
    }

    #[test]
    fn apply_wraps_the_source_in_where() {
        let mut ctx = customer_context();
        let source = Expression::constant(Value::collection(customers()));
        let sam = clause(QueryNode::binary(BinaryOperatorKind::Equal, customer("Name"), string("Sam")));
        let filtered = FilterBinder::apply(source, &sam, &mut ctx).unwrap();
        match Interpreter::new().evaluate(&filtered).unwrap() {
            Value::Collection(kept) => assert_eq!(kept.len(), 1),
            other => panic!("expected a collection, got {other}"),
        }
    }
}
