use crate::{error::Result, expr::Value};

/// The per-group state of one aggregate.
/// The interpreter will:
///   1) evaluate the aggregated selector for every element of the group
///   2) call `update(&mut self, &value)` once per element
///   3) after the last element, call `finalize()`
///
/// Distinct handling is done upstream (a `Distinct` call before the aggregate)
/// so `update` only implements the plain semantics.
pub trait Accumulator: Send {
    /// Update the running state with the value of this element.
    fn update(&mut self, value: &Value) -> Result<()>;

    /// Produce the final result, typed as the aggregate's result type.
    fn finalize(&self) -> Result<Value>;
}
