use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::expr::aggregates::{AggregateImpl, AverageImpl, CountImpl, MaxImpl, MinImpl, SumImpl};

static BUILT_INS: Lazy<AggregateRegistry> = Lazy::new(|| {
    let mut registry = AggregateRegistry::default();
    registry.insert(Arc::new(CountImpl));
    registry.insert(Arc::new(SumImpl));
    registry.insert(Arc::new(AverageImpl));
    registry.insert(Arc::new(MinImpl));
    registry.insert(Arc::new(MaxImpl));
    registry
});

/// Aggregates by lowercase name, in registration order.
#[derive(Default, Clone)]
pub struct AggregateRegistry {
    entries: IndexMap<String, Arc<dyn AggregateImpl>>,
}

impl AggregateRegistry {
    /// `count`, `sum`, `average`, `min` and `max`.
    pub fn built_ins() -> &'static AggregateRegistry {
        &BUILT_INS
    }

    /// Replaces any aggregate already registered under the same name.
    pub fn insert(&mut self, imp: Arc<dyn AggregateImpl>) {
        self.entries.insert(imp.name().to_ascii_lowercase(), imp);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AggregateImpl>> {
        self.entries.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for AggregateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
