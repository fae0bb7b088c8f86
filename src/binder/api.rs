//! Clause-level entry points.

use crate::{
    ast::{ComputeTransformationNode, FilterClause, OrderByClause, TransformationNode},
    binder::{AggregationBinder, BinderContext, ComputeBinder, FilterBinder, OrderByBinder, OrderByBinding},
    error::Result,
    expr::Lambda,
};

/// `$filter` to a `record => bool` predicate.
pub fn bind_filter(clause: &FilterClause, ctx: &mut BinderContext) -> Result<Lambda> {
    FilterBinder::bind(clause, ctx)
}

/// `$orderby` to its key selectors with their directions, in chain order.
pub fn bind_order_by(clause: &OrderByClause, ctx: &mut BinderContext) -> Result<Vec<OrderByBinding>> {
    OrderByBinder::bind(clause, ctx)
}

/// `groupby`/`aggregate` to `(key selector, result selector)`.
pub fn bind_group_by_and_aggregate(transformation: &TransformationNode, ctx: &mut BinderContext) -> Result<(Lambda, Lambda)> {
    AggregationBinder::bind(transformation, ctx)
}

pub fn bind_compute(transformation: &ComputeTransformationNode, ctx: &mut BinderContext) -> Result<Lambda> {
    ComputeBinder::bind(transformation, ctx)
}
