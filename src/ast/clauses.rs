use std::fmt;

use crate::ast::{QueryNode, RangeVariable};

/// A `$filter` clause: a boolean expression over `range_variable`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub expression: QueryNode,
    pub range_variable: RangeVariable,
}

impl FilterClause {
    pub fn new(expression: QueryNode, range_variable: RangeVariable) -> Self {
        Self { expression, range_variable }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByDirection {
    Ascending,
    Descending,
}

impl fmt::Display for OrderByDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderByDirection::Ascending => write!(f, "asc"),
            OrderByDirection::Descending => write!(f, "desc"),
        }
    }
}

/// One `$orderby` key plus the keys that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub expression: QueryNode,
    pub direction: OrderByDirection,
    pub range_variable: RangeVariable,
    pub then_by: Option<Box<OrderByClause>>,
}

impl OrderByClause {
    pub fn new(expression: QueryNode, direction: OrderByDirection, range_variable: RangeVariable) -> Self {
        Self { expression, direction, range_variable, then_by: None }
    }

    pub fn then_by(mut self, next: OrderByClause) -> Self {
        match &mut self.then_by {
            Some(existing) => {
                let chained = existing.as_ref().clone().then_by(next);
                self.then_by = Some(Box::new(chained));
            }
            None => self.then_by = Some(Box::new(next)),
        }
        self
    }

    /// This clause followed by every `then_by` clause, in order.
    pub fn chain(&self) -> Vec<&OrderByClause> {
        let mut clauses = vec![self];
        let mut current = self.then_by.as_deref();
        while let Some(clause) = current {
            clauses.push(clause);
            current = clause.then_by.as_deref();
        }
        clauses
    }
}
