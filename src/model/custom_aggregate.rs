use std::{fmt, sync::Arc};

use crate::{expr::aggregates::{Accumulator, AggregateImpl}, model::HostType};

/// A model-level aggregation method resolved for a concrete input type.
#[derive(Clone)]
pub struct HostMethod {
    /// Label used in the query (`with Custom.StdDev as X`).
    pub label: String,
    pub input: HostType,
    pub result: HostType,
    pub implementation: Arc<dyn AggregateImpl>,
}

impl HostMethod {
    /// Resolve `implementation` for `input`; `None` when it has no overload for that type.
    pub fn resolve(label: &str, input: &HostType, implementation: Arc<dyn AggregateImpl>) -> Option<Self> {
        let result = implementation.result_type(input)?;
        Some(Self {
            label: label.to_string(),
            input: input.clone(),
            result,
            implementation,
        })
    }

    pub fn name(&self) -> &'static str {
        self.implementation.name()
    }

    pub fn create_accumulator(&self) -> Box<dyn Accumulator> {
        self.implementation.create_accumulator(&self.result)
    }
}

impl PartialEq for HostMethod {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.input == other.input
            && self.result == other.result
            && Arc::ptr_eq(&self.implementation, &other.implementation)
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMethod")
            .field("label", &self.label)
            .field("name", &self.name())
            .field("input", &self.input)
            .field("result", &self.result)
            .finish()
    }
}
