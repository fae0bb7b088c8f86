use crate::{
    binder::BinderContext,
    error::{BinderError, Result},
    expr::{BinaryOp, Expression, Value},
    model::HostType,
};

/// Guards for accesses through values that may be null.
pub struct NullPropagation;

impl NullPropagation {
    /// Whether an access through `source` has to be guarded: null propagation
    /// is on and `source` may be null. The clause's own record and non-null
    /// literals never are.
    pub fn needs_guard(source: &Expression, ctx: &BinderContext) -> bool {
        ctx.settings.null_propagation
            && source.ty().is_nullable()
            && !ctx.is_current(source)
            && !matches!(source, Expression::Constant { value, .. } if !value.is_null())
    }

    /// `source == null ? null : result`, typed as the nullable form of `result`.
    pub fn guard(source: &Expression, result: Expression) -> Expression {
        let ty = result.ty().to_nullable();
        Expression::conditional(
            Expression::equal(source.clone(), Expression::null(&source.ty())),
            Expression::null(&ty),
            Expression::convert_if_needed(result, &ty),
        )
    }

    pub fn guard_if_needed(source: &Expression, result: Expression, ctx: &BinderContext) -> Expression {
        if Self::needs_guard(source, ctx) {
            Self::guard(source, result)
        } else {
            result
        }
    }

    /// Make a predicate body non-nullable. With null propagation `null` folds
    /// to `false` through a non-lifted `== true`; without it the body is
    /// narrowed by a conversion.
    pub fn normalize_predicate(body: Expression, ctx: &BinderContext) -> Result<Expression> {
        let ty = body.ty();
        let body = match ty {
            HostType::Bool => return Ok(body),
            HostType::Object => Expression::convert(body, HostType::Bool.to_nullable()),
            ref t if t.is_bool() => body,
            other => return Err(BinderError::type_mismatch(HostType::Bool, other)),
        };
        if ctx.settings.null_propagation {
            let truth = Expression::typed_constant(Value::Bool(true), HostType::Bool.to_nullable());
            Ok(Expression::binary(BinaryOp::Equal, body, truth, false))
        } else {
            Ok(Expression::convert(body, HostType::Bool))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        binder::{
            _tests::{customer_type, context_for},
            BinderSettings,
        },
        expr::{Interpreter, Lambda, Parameter},
    };

    use super::*;

    #[test]
    fn nullable_predicates_fold_unknown_to_false() {
        let ctx = context_for(&customer_type(), BinderSettings::new());
        let flag = Parameter::new("flag", HostType::Bool.to_nullable());
        let body = NullPropagation::normalize_predicate(Expression::parameter(&flag), &ctx).unwrap();
        assert_eq!(body.ty(), HostType::Bool);

        let lambda = Lambda::new(flag, body);
        assert_eq!(Interpreter::invoke(&lambda, Value::Null), Ok(Value::Bool(false)));
        assert_eq!(Interpreter::invoke(&lambda, Value::Bool(true)), Ok(Value::Bool(true)));
    }

    #[test]
    fn narrowing_without_null_propagation() {
        let ctx = context_for(&customer_type(), BinderSettings::without_null_propagation());
        let flag = Parameter::new("flag", HostType::Bool.to_nullable());
        let body = NullPropagation::normalize_predicate(Expression::parameter(&flag), &ctx).unwrap();
        assert!(matches!(body, Expression::Convert { ty: HostType::Bool, .. }));

        let not_bool = NullPropagation::normalize_predicate(Expression::constant(Value::Int32(1)), &ctx);
        assert!(matches!(not_bool, Err(BinderError::TypeMismatch { .. })));
    }

    #[test]
    fn current_record_is_never_guarded() {
        let ctx = context_for(&customer_type(), BinderSettings::new());
        assert!(!NullPropagation::needs_guard(&Expression::parameter(ctx.current()), &ctx));
        let other = Parameter::new("x", HostType::record("NS.Customer"));
        assert!(NullPropagation::needs_guard(&Expression::parameter(&other), &ctx));
        assert!(!NullPropagation::needs_guard(&Expression::constant(Value::string("a")), &ctx));
    }
}
