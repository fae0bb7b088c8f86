use serde::{Deserialize, Serialize};

use crate::error::{BinderError, Result};

/// Knobs for one bind call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderSettings {
    /// Accesses through a possibly-null value short-circuit to null/false
    /// instead of failing at execution time.
    pub null_propagation: bool,
    /// Emit literal constants as captured values instead of inline constants.
    pub parameterize_constants: bool,
    /// Deepest AST nesting accepted before binding fails.
    pub max_depth: usize,
}

impl Default for BinderSettings {
    fn default() -> Self {
        Self { null_propagation: true, parameterize_constants: false, max_depth: 256 }
    }
}

impl BinderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for a target that handles nulls itself (a translating query
    /// provider, for instance).
    pub fn without_null_propagation() -> Self {
        Self { null_propagation: false, ..Self::default() }
    }

    pub fn parameterized() -> Self {
        Self { parameterize_constants: true, ..Self::default() }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BinderError::InvalidSettings(e.to_string()))
    }
}
