use crate::{expr::aggregates::Accumulator, model::HostType};

/// Per-aggregate metadata + factory.
/// One instance is registered per aggregate name (built-in or model-level custom).
/// It is stateless and thread-safe to share.
pub trait AggregateImpl: Send + Sync {
    /// Canonical lowercase name ("sum", "average", ...).
    fn name(&self) -> &'static str;

    /// Static result type for an input of type `input`, or `None` when the
    /// aggregate has no operator for that type.
    fn result_type(&self, input: &HostType) -> Option<HostType>;

    /// Create a fresh accumulator for one group, producing values of `result`.
    fn create_accumulator(&self, result: &HostType) -> Box<dyn Accumulator>;
}
