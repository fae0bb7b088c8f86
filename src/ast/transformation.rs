use std::fmt;

use crate::ast::{FilterClause, QueryNode};

/// Aggregation method named in an `aggregate(...)` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationMethod {
    Sum,
    Min,
    Max,
    Average,
    CountDistinct,
    /// `$count`: number of records in the group; has no property.
    VirtualPropertyCount,
    /// Model-level method, by label.
    Custom(String),
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMethod::Sum => write!(f, "sum"),
            AggregationMethod::Min => write!(f, "min"),
            AggregationMethod::Max => write!(f, "max"),
            AggregationMethod::Average => write!(f, "average"),
            AggregationMethod::CountDistinct => write!(f, "countdistinct"),
            AggregationMethod::VirtualPropertyCount => write!(f, "$count"),
            AggregationMethod::Custom(label) => write!(f, "{}", label),
        }
    }
}

/// `expression with method as alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpression {
    pub method: AggregationMethod,
    /// `None` only for `$count`.
    pub expression: Option<QueryNode>,
    pub alias: String,
}

impl AggregateExpression {
    pub fn new(expression: QueryNode, method: AggregationMethod, alias: &str) -> Self {
        Self { method, expression: Some(expression), alias: alias.to_string() }
    }

    pub fn count(alias: &str) -> Self {
        Self { method: AggregationMethod::VirtualPropertyCount, expression: None, alias: alias.to_string() }
    }
}

/// Aggregates computed over a related collection: `Sales(Amount with sum as Total)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySetAggregateExpression {
    pub expression: QueryNode,
    pub alias: String,
    pub children: Vec<AggregateExpressionBase>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateExpressionBase {
    Property(AggregateExpression),
    EntitySet(EntitySetAggregateExpression),
}

impl AggregateExpressionBase {
    pub fn alias(&self) -> &str {
        match self {
            AggregateExpressionBase::Property(p) => &p.alias,
            AggregateExpressionBase::EntitySet(e) => &e.alias,
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(
            self,
            AggregateExpressionBase::Property(AggregateExpression { method: AggregationMethod::VirtualPropertyCount, .. })
        )
    }
}

/// One grouping property; complex properties group by their `children`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByPropertyNode {
    pub name: String,
    pub expression: Option<QueryNode>,
    pub children: Vec<GroupByPropertyNode>,
}

impl GroupByPropertyNode {
    pub fn leaf(name: &str, expression: QueryNode) -> Self {
        Self { name: name.to_string(), expression: Some(expression), children: Vec::new() }
    }

    pub fn nested(name: &str, children: Vec<GroupByPropertyNode>) -> Self {
        Self { name: name.to_string(), expression: None, children }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateTransformationNode {
    pub expressions: Vec<AggregateExpressionBase>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupByTransformationNode {
    pub grouping_properties: Vec<GroupByPropertyNode>,
    pub child: Option<AggregateTransformationNode>,
}

/// `expression as alias` inside `compute(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeExpression {
    pub expression: QueryNode,
    pub alias: String,
}

impl ComputeExpression {
    pub fn new(expression: QueryNode, alias: &str) -> Self {
        Self { expression, alias: alias.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputeTransformationNode {
    pub expressions: Vec<ComputeExpression>,
}

/// One step of an `$apply` pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformationNode {
    GroupBy(GroupByTransformationNode),
    Aggregate(AggregateTransformationNode),
    Compute(ComputeTransformationNode),
    Filter(FilterClause),
}

impl TransformationNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TransformationNode::GroupBy(_) => "GroupBy",
            TransformationNode::Aggregate(_) => "Aggregate",
            TransformationNode::Compute(_) => "Compute",
            TransformationNode::Filter(_) => "Filter",
        }
    }

    /// Grouping properties; empty for a plain `aggregate`.
    pub fn grouping_properties(&self) -> &[GroupByPropertyNode] {
        match self {
            TransformationNode::GroupBy(g) => &g.grouping_properties,
            _ => &[],
        }
    }

    /// Aggregate expressions; empty for a `groupby` without an aggregate child.
    pub fn aggregate_expressions(&self) -> &[AggregateExpressionBase] {
        match self {
            TransformationNode::GroupBy(GroupByTransformationNode { child: Some(child), .. })
            | TransformationNode::Aggregate(child) => &child.expressions,
            _ => &[],
        }
    }
}
