use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::{ComputeExpression, RangeVariable, IT, THIS},
    binder::BinderSettings,
    container::SOURCE,
    error::{BinderError, Result},
    expr::{Expression, ModelHandle, Parameter, Value},
    model::{EdmTypeRef, HostMember, HostType, ModelResolver},
};

/// Where `$it`/`$this` point once a flattening projection replaced the
/// current parameter.
#[derive(Debug, Clone)]
struct FlatteningSource {
    source_type: HostType,
}

/// Clause state a failed bind must not leave behind.
#[derive(Debug, Clone)]
struct Snapshot {
    current: Parameter,
    root: Parameter,
    flattened_properties: IndexMap<String, Expression>,
    flattening_source: Option<FlatteningSource>,
    computed_properties: IndexMap<String, ComputeExpression>,
}

/// State threaded through one top-level bind call.
///
/// Holds the model and settings, the current and root parameters, the
/// lambda range variables in scope, and the maps filled by flattening and
/// compute. Not meant to be shared between concurrent bind calls; derive a
/// child context instead.
#[derive(Debug, Clone)]
pub struct BinderContext {
    pub model: Arc<dyn ModelResolver>,
    pub settings: BinderSettings,
    current: Parameter,
    root: Parameter,
    lambda_parameters: IndexMap<String, Parameter>,
    /// Navigation path (segments joined by `\`) to its single-hop replacement.
    pub flattened_properties: IndexMap<String, Expression>,
    flattening_source: Option<FlatteningSource>,
    /// Computed columns visible to the clause, by alias.
    pub computed_properties: IndexMap<String, ComputeExpression>,
    depth: usize,
    captured: usize,
}

impl BinderContext {
    pub fn new(model: Arc<dyn ModelResolver>, settings: BinderSettings, element_type: HostType) -> Self {
        let current = Parameter::new(IT, element_type);
        Self {
            model,
            settings,
            root: current.clone(),
            current,
            lambda_parameters: IndexMap::new(),
            flattened_properties: IndexMap::new(),
            flattening_source: None,
            computed_properties: IndexMap::new(),
            depth: 0,
            captured: 0,
        }
    }

    /// Context over the host type the model maps `element_type` onto.
    pub fn for_type(model: Arc<dyn ModelResolver>, settings: BinderSettings, element_type: &EdmTypeRef) -> Result<Self> {
        let host = model
            .resolve_host_type(element_type)
            .ok_or_else(|| BinderError::TypeNotInModel(element_type.full_name()))?;
        Ok(Self::new(model, settings, host))
    }

    /// Child context for a nested clause over `element_type`: same model,
    /// settings and bindings, new current parameter.
    pub fn derive(&self, element_type: HostType) -> Self {
        let mut child = self.clone();
        child.current = Parameter::new(IT, element_type);
        child.flattening_source = None;
        child.flattened_properties = IndexMap::new();
        child
    }

    /// Take over the capture counter of a child made by [`derive`](Self::derive),
    /// so captured names stay unique across the whole bind.
    pub fn merge_captures(&mut self, child: &BinderContext) {
        self.captured = self.captured.max(child.captured);
    }

    pub fn current(&self) -> &Parameter {
        &self.current
    }

    pub fn root(&self) -> &Parameter {
        &self.root
    }

    pub fn element_type(&self) -> &HostType {
        &self.current.ty
    }

    pub fn is_flattened(&self) -> bool {
        self.flattening_source.is_some()
    }

    /// Expression standing for the clause's record: the current parameter, or
    /// the `Source` back-reference of a flattening projection.
    pub fn current_expression(&self) -> Expression {
        match &self.flattening_source {
            Some(flattening) => Expression::member(
                Expression::parameter(&self.current),
                HostMember::new(&self.current.ty.to_string(), SOURCE, flattening.source_type.clone()),
            ),
            None => Expression::parameter(&self.current),
        }
    }

    /// Whether `expr` is the clause's own record, which is never null.
    pub fn is_current(&self, expr: &Expression) -> bool {
        match expr {
            Expression::Parameter(p) => *p == self.current,
            other => self.is_flattened() && *other == self.current_expression(),
        }
    }

    /// Replace the current parameter with the flattening projection's and
    /// record the path map built for it.
    pub fn enter_flattening(&mut self, parameter: Parameter, flattened: IndexMap<String, Expression>) {
        let previous = std::mem::replace(&mut self.current, parameter);
        if self.root == previous {
            self.root = self.current.clone();
        }
        self.flattening_source = Some(FlatteningSource { source_type: previous.ty });
        self.flattened_properties = flattened;
        debug!(slots = self.flattened_properties.len(), "entered flattened context");
    }

    pub fn resolve_range_variable(&self, variable: &RangeVariable) -> Result<Expression> {
        match variable.name.as_str() {
            THIS => Ok(self.current_expression()),
            IT => {
                if self.is_flattened() || self.root == self.current {
                    return Ok(self.current_expression());
                }
                let declared = self.model.resolve_host_type(&variable.ty);
                if declared.as_ref() == Some(&self.current.ty) {
                    Ok(self.current_expression())
                } else {
                    Ok(Expression::parameter(&self.root))
                }
            }
            name => self
                .lambda_parameters
                .get(name)
                .map(Expression::parameter)
                .ok_or_else(|| BinderError::UnknownRangeVariable(name.to_string())),
        }
    }

    /// Run `f` with `name` bound to a new parameter of `ty`, or to the
    /// existing binding when an enclosing scope already bound `name`. A
    /// binding pushed here is popped before returning, whatever `f` returns.
    pub fn with_range_variable<T>(
        &mut self,
        name: &str,
        ty: HostType,
        f: impl FnOnce(&mut Self, &Parameter) -> Result<T>,
    ) -> Result<T> {
        let (parameter, pushed) = match self.lambda_parameters.get(name) {
            Some(existing) => (existing.clone(), false),
            None => {
                let parameter = Parameter::new(name, ty);
                self.lambda_parameters.insert(name.to_string(), parameter.clone());
                debug!(name, "pushed range variable");
                (parameter, true)
            }
        };

        let result = f(self, &parameter);

        if pushed {
            self.lambda_parameters.shift_remove(name);
            debug!(name, "popped range variable");
        }
        result
    }

    /// Run `f`, restoring the current and root parameters, the flattening
    /// state and the computed columns when it fails.
    pub fn all_or_nothing<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = Snapshot {
            current: self.current.clone(),
            root: self.root.clone(),
            flattened_properties: self.flattened_properties.clone(),
            flattening_source: self.flattening_source.clone(),
            computed_properties: self.computed_properties.clone(),
        };
        let result = f(self);
        if result.is_err() {
            self.current = snapshot.current;
            self.root = snapshot.root;
            self.flattened_properties = snapshot.flattened_properties;
            self.flattening_source = snapshot.flattening_source;
            self.computed_properties = snapshot.computed_properties;
            debug!("restored context after failed bind");
        }
        result
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lambda_parameters.contains_key(name)
    }

    /// Run `f` one nesting level deeper, failing once `max_depth` is exceeded.
    pub fn descend<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.settings.max_depth {
            return Err(BinderError::NestingTooDeep { depth: self.depth + 1, max: self.settings.max_depth });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// The model handle, captured rather than inlined.
    pub fn model_expression(&self) -> Expression {
        Expression::captured("model", Value::Model(ModelHandle(self.model.clone())), HostType::Model)
    }

    /// A literal, inlined or captured depending on `parameterize_constants`.
    pub fn constant_expression(&mut self, value: Value, ty: HostType) -> Expression {
        if self.settings.parameterize_constants && !value.is_null() {
            let name = format!("p{}", self.captured);
            self.captured += 1;
            Expression::captured(&name, value, ty)
        } else {
            Expression::typed_constant(value, ty)
        }
    }

    pub fn resolve_host_type(&self, ty: &EdmTypeRef) -> Result<HostType> {
        self.model
            .resolve_host_type(ty)
            .ok_or_else(|| BinderError::TypeNotInModel(ty.full_name()))
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::_tests::{customer_context, model};

    use super::*;

    #[test]
    fn range_variable_scope_is_popped_on_error() {
        let mut ctx = customer_context();
        let result: Result<()> = ctx.with_range_variable("x", HostType::Int32, |ctx, _| {
            assert!(ctx.is_bound("x"));
            Err(BinderError::unsupported("SearchTerm"))
        });
        assert!(result.is_err());
        assert!(!ctx.is_bound("x"));
    }

    #[test]
    fn failed_step_restores_flattening_and_computed_columns() {
        let mut ctx = customer_context();
        let before = ctx.current().clone();
        let wrapper = Parameter::new(IT, HostType::Wrapper(crate::container::WrapperKind::Flattening));
        let result: Result<()> = ctx.all_or_nothing(|ctx| {
            ctx.enter_flattening(wrapper.clone(), IndexMap::from([("A\\B".to_string(), Expression::bool(true))]));
            ctx.computed_properties.insert(
                "X".into(),
                ComputeExpression::new(crate::ast::QueryNode::constant(crate::ast::Literal::Int32(1)), "X"),
            );
            Err(BinderError::unsupported("SearchTerm"))
        });
        assert!(result.is_err());
        assert!(!ctx.is_flattened());
        assert_eq!(ctx.current(), &before);
        assert_eq!(ctx.root(), &before);
        assert!(ctx.flattened_properties.is_empty());
        assert!(ctx.computed_properties.is_empty());

        ctx.all_or_nothing(|ctx| {
            ctx.enter_flattening(wrapper.clone(), IndexMap::new());
            Ok(())
        })
        .unwrap();
        assert!(ctx.is_flattened());
    }

    #[test]
    fn enclosing_binding_is_reused() {
        let mut ctx = customer_context();
        ctx.with_range_variable("x", HostType::Int32, |ctx, outer| {
            let outer = outer.clone();
            ctx.with_range_variable("x", HostType::Int64, |ctx, inner| {
                assert_eq!(*inner, outer);
                assert!(ctx.is_bound("x"));
                Ok(())
            })?;
            assert!(ctx.is_bound("x"));
            Ok(())
        })
        .unwrap();
        assert!(!ctx.is_bound("x"));
    }

    #[test]
    fn it_prefers_current_when_types_match() {
        let ctx = customer_context();
        let nested = ctx.derive(HostType::record("NS.Order"));

        let order_it = RangeVariable::it(EdmTypeRef::entity("NS.Order"));
        assert_eq!(nested.resolve_range_variable(&order_it).unwrap(), Expression::parameter(nested.current()));

        let customer_it = RangeVariable::it(EdmTypeRef::entity("NS.Customer"));
        assert_eq!(nested.resolve_range_variable(&customer_it).unwrap(), Expression::parameter(ctx.root()));

        let unknown = RangeVariable::new("y", EdmTypeRef::int32(false));
        assert_eq!(
            nested.resolve_range_variable(&unknown),
            Err(BinderError::UnknownRangeVariable("y".into()))
        );
    }

    #[test]
    fn depth_guard_rejects_deep_nesting() {
        let mut ctx = BinderContext::new(model(), BinderSettings::new().with_max_depth(2), HostType::Int32);
        fn nest(ctx: &mut BinderContext, n: usize) -> Result<usize> {
            if n == 0 {
                return Ok(0);
            }
            ctx.descend(|ctx| nest(ctx, n - 1).map(|d| d + 1))
        }
        assert_eq!(nest(&mut ctx, 2), Ok(2));
        assert_eq!(nest(&mut ctx, 3), Err(BinderError::NestingTooDeep { depth: 3, max: 2 }));
        assert_eq!(nest(&mut ctx, 1), Ok(1));
    }

    #[test]
    fn constants_are_captured_when_parameterized() {
        let mut ctx = BinderContext::new(model(), BinderSettings::parameterized(), HostType::Int32);
        let c = ctx.constant_expression(Value::Int32(1), HostType::Int32);
        assert_eq!(c, Expression::captured("p0", Value::Int32(1), HostType::Int32));
        let null = ctx.constant_expression(Value::Null, HostType::String);
        assert!(null.is_null_constant());
    }
}
