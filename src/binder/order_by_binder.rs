use tracing::{debug, trace};

use crate::{
    ast::{OrderByClause, OrderByDirection},
    binder::{BinderContext, QueryBinder},
    error::{BinderError, Result},
    expr::{Expression, Lambda},
    model::HostType,
};

/// One bound sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByBinding {
    pub lambda: Lambda,
    pub direction: OrderByDirection,
}

/// Binds `$orderby` chains to key selectors.
pub struct OrderByBinder;

impl OrderByBinder {
    /// One binding per clause of the `then_by` chain, in order.
    pub fn bind(clause: &OrderByClause, ctx: &mut BinderContext) -> Result<Vec<OrderByBinding>> {
        let mut bindings = Vec::new();
        for key in clause.chain() {
            trace!(direction = %key.direction, "bind order key");
            let body = QueryBinder::bind(&key.expression, ctx)?;
            Self::check_orderable(&body)?;
            bindings.push(OrderByBinding { lambda: Lambda::new(ctx.current().clone(), body), direction: key.direction });
        }
        debug!(keys = bindings.len(), "bound order-by");
        Ok(bindings)
    }

    fn check_orderable(key: &Expression) -> Result<()> {
        let ty = key.ty();
        match ty {
            HostType::Collection(_)
            | HostType::Grouping { .. }
            | HostType::Record(_)
            | HostType::Dictionary
            | HostType::Container
            | HostType::Wrapper(_)
            | HostType::Model => Err(BinderError::type_mismatch("orderable value", ty)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{QueryNode, RangeVariable},
        binder::_tests::{customer, customer_context, customer_type, customers, run},
        expr::Value,
    };

    use super::*;

    fn key(node: QueryNode, direction: OrderByDirection) -> OrderByClause {
        OrderByClause::new(node, direction, RangeVariable::it(customer_type()))
    }

    #[test]
    fn chain_binds_in_order() {
        let mut ctx = customer_context();
        let clause = key(customer("Rank"), OrderByDirection::Descending)
            .then_by(key(customer("Address/City"), OrderByDirection::Ascending))
            .then_by(key(customer("Visits"), OrderByDirection::Ascending));
        let bindings = OrderByBinder::bind(&clause, &mut ctx).unwrap();

        let directions: Vec<_> = bindings.iter().map(|b| b.direction).collect();
        assert_eq!(
            directions,
            vec![OrderByDirection::Descending, OrderByDirection::Ascending, OrderByDirection::Ascending]
        );
        assert_eq!(bindings[0].lambda.return_type(), HostType::Int64);
        assert_eq!(
            run(&bindings[1].lambda, &customers()),
            vec![Value::string("Oslo"), Value::Null, Value::string("Bergen")]
        );
        // unsigned columns sort as their widened type
        assert_eq!(bindings[2].lambda.return_type(), HostType::Int32);
    }

    #[test]
    fn structured_keys_are_rejected() {
        let mut ctx = customer_context();
        for path in ["Address", "Orders", "Tags"] {
            let result = OrderByBinder::bind(&key(customer(path), OrderByDirection::Ascending), &mut ctx);
            assert!(matches!(result, Err(BinderError::TypeMismatch { .. })), "{path}");
        }
    }
}
