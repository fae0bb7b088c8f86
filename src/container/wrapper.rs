use std::fmt;

/// Member names exposed by wrapper and grouping shapes.
pub const GROUP_BY_CONTAINER: &str = "GroupByContainer";
pub const CONTAINER: &str = "Container";
pub const SOURCE: &str = "Source";
pub const INSTANCE: &str = "Instance";
pub const MODEL: &str = "Model";
pub const KEY: &str = "Key";

/// Closed set of record shapes synthesized while binding transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    /// Grouping key built from a container chain of grouping properties.
    GroupBy,
    /// Sentinel key used when a transformation has no grouping properties.
    NoGroupBy,
    /// Aggregate results, optionally carrying the grouping container.
    Aggregation,
    /// Pre-grouping projection of navigation-reached properties.
    Flattening,
    /// Current record augmented with computed columns.
    Compute,
}

impl fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WrapperKind::GroupBy => "GroupByWrapper",
            WrapperKind::NoGroupBy => "NoGroupByWrapper",
            WrapperKind::Aggregation => "AggregationWrapper",
            WrapperKind::Flattening => "FlatteningWrapper",
            WrapperKind::Compute => "ComputeWrapper",
        };
        write!(f, "{name}")
    }
}

/// A wrapper record. Which members are populated depends on `kind`; the
/// container members hold container-typed values (a built chain or a read of
/// an existing one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper<T> {
    pub kind: WrapperKind,
    pub group_by_container: Option<T>,
    pub container: Option<T>,
    pub source: Option<T>,
    pub instance: Option<T>,
    pub model: Option<T>,
}

impl<T> Wrapper<T> {
    fn empty(kind: WrapperKind) -> Self {
        Self { kind, group_by_container: None, container: None, source: None, instance: None, model: None }
    }

    pub fn group_by(group_by_container: T) -> Self {
        Self { group_by_container: Some(group_by_container), ..Self::empty(WrapperKind::GroupBy) }
    }

    pub fn no_group_by() -> Self {
        Self::empty(WrapperKind::NoGroupBy)
    }

    pub fn aggregation(container: Option<T>, group_by_container: Option<T>) -> Self {
        Self { container, group_by_container, ..Self::empty(WrapperKind::Aggregation) }
    }

    pub fn flattening(source: T, container: T) -> Self {
        Self { source: Some(source), container: Some(container), ..Self::empty(WrapperKind::Flattening) }
    }

    pub fn compute(instance: T, model: T, container: Option<T>) -> Self {
        Self { instance: Some(instance), model: Some(model), container, ..Self::empty(WrapperKind::Compute) }
    }

    /// Rebuild the wrapper with every carried value mapped.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<Wrapper<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        Ok(Wrapper {
            kind: self.kind,
            group_by_container: self.group_by_container.as_ref().map(&mut f).transpose()?,
            container: self.container.as_ref().map(&mut f).transpose()?,
            source: self.source.as_ref().map(&mut f).transpose()?,
            instance: self.instance.as_ref().map(&mut f).transpose()?,
            model: self.model.as_ref().map(&mut f).transpose()?,
        })
    }
}

impl<T: fmt::Display> fmt::Display for Wrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "new {}(", self.kind)?;
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !std::mem::take(&mut first) {
                write!(f, ", ")?;
            }
            Ok(())
        };
        if let Some(c) = &self.group_by_container {
            sep(f)?;
            write!(f, "{GROUP_BY_CONTAINER} = {c}")?;
        }
        if let Some(c) = &self.container {
            sep(f)?;
            write!(f, "{CONTAINER} = {c}")?;
        }
        if let Some(s) = &self.source {
            sep(f)?;
            write!(f, "{SOURCE} = {s}")?;
        }
        if let Some(i) = &self.instance {
            sep(f)?;
            write!(f, "{INSTANCE} = {i}")?;
        }
        if let Some(m) = &self.model {
            sep(f)?;
            write!(f, "{MODEL} = {m}")?;
        }
        write!(f, ")")
    }
}
