use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::trace;

use crate::{
    ast::QueryNode,
    binder::{BinderContext, ConvertBinder, NullPropagation, QueryBinder},
    error::{BinderError, Result},
    expr::{BinaryOp, Expression, Method},
    model::HostType,
};

/// What a built-in accepts in one argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Text,
    Integral,
    Numeric,
    /// Date, DateTime or DateTimeOffset.
    Dated,
    /// Anything carrying a time of day.
    Timed,
}

impl ArgKind {
    fn accepts(self, ty: &HostType) -> bool {
        match self {
            ArgKind::Text => ty.is_string(),
            ArgKind::Integral => ty.is_integral(),
            ArgKind::Numeric => ty.is_numeric(),
            ArgKind::Dated => ty.is_date_family(),
            ArgKind::Timed => {
                ty.is_time_family() || matches!(ty.non_nullable(), HostType::DateTime | HostType::DateTimeOffset)
            }
        }
    }

    /// Type a dynamic argument is converted to.
    fn canonical(self) -> HostType {
        match self {
            ArgKind::Text => HostType::String,
            ArgKind::Integral => HostType::Int32.to_nullable(),
            ArgKind::Numeric => HostType::Decimal.to_nullable(),
            ArgKind::Dated => HostType::DateTimeOffset.to_nullable(),
            ArgKind::Timed => HostType::TimeOfDay.to_nullable(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ArgKind::Text => "a string",
            ArgKind::Integral => "an integer",
            ArgKind::Numeric => "a number",
            ArgKind::Dated => "a date",
            ArgKind::Timed => "a time",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Builtin {
    method: fn() -> Method,
    /// Kinds of the positional arguments; the ones past `required` are optional.
    args: &'static [ArgKind],
    required: usize,
}

impl Builtin {
    fn new(method: fn() -> Method, args: &'static [ArgKind]) -> Self {
        Self { method, args, required: args.len() }
    }

    fn optional_tail(mut self, optional: usize) -> Self {
        self.required = self.args.len() - optional;
        self
    }
}

static BUILTIN_FUNCTIONS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    use ArgKind::*;
    HashMap::from([
        // String
        ("contains", Builtin::new(|| Method::Contains, &[Text, Text])),
        ("startswith", Builtin::new(|| Method::StartsWith, &[Text, Text])),
        ("endswith", Builtin::new(|| Method::EndsWith, &[Text, Text])),
        ("length", Builtin::new(|| Method::Length, &[Text])),
        ("indexof", Builtin::new(|| Method::IndexOf, &[Text, Text])),
        ("substring", Builtin::new(|| Method::Substring, &[Text, Integral, Integral]).optional_tail(1)),
        ("tolower", Builtin::new(|| Method::ToLower, &[Text])),
        ("toupper", Builtin::new(|| Method::ToUpper, &[Text])),
        ("trim", Builtin::new(|| Method::Trim, &[Text])),
        ("concat", Builtin::new(|| Method::Concat, &[Text, Text])),
        ("matchespattern", Builtin::new(|| Method::MatchesPattern, &[Text, Text])),
        // Date and time
        ("year", Builtin::new(|| Method::Year, &[Dated])),
        ("month", Builtin::new(|| Method::Month, &[Dated])),
        ("day", Builtin::new(|| Method::Day, &[Dated])),
        ("hour", Builtin::new(|| Method::Hour, &[Timed])),
        ("minute", Builtin::new(|| Method::Minute, &[Timed])),
        ("second", Builtin::new(|| Method::Second, &[Timed])),
        ("fractionalseconds", Builtin::new(|| Method::FractionalSeconds, &[Timed])),
        ("date", Builtin::new(|| Method::DatePart, &[Dated])),
        ("time", Builtin::new(|| Method::TimePart, &[Timed])),
        // Math
        ("round", Builtin::new(|| Method::Round, &[Numeric])),
        ("floor", Builtin::new(|| Method::Floor, &[Numeric])),
        ("ceiling", Builtin::new(|| Method::Ceiling, &[Numeric])),
    ])
});

/// Built-in function calls.
pub struct FunctionBinder;

impl FunctionBinder {
    pub fn bind(name: &str, args: &[QueryNode], ctx: &mut BinderContext) -> Result<Expression> {
        trace!(name, args = args.len(), "bind function");
        let lowered = name.to_ascii_lowercase();
        if matches!(lowered.as_str(), "cast" | "isof") {
            return ConvertBinder::bind_type_function(&lowered, args, ctx);
        }
        let builtin = *BUILTIN_FUNCTIONS
            .get(lowered.as_str())
            .ok_or_else(|| BinderError::UnknownFunction(name.to_string()))?;

        if args.len() < builtin.required || args.len() > builtin.args.len() {
            let expected = if builtin.required == builtin.args.len() {
                builtin.required.to_string()
            } else {
                format!("{} to {}", builtin.required, builtin.args.len())
            };
            return Err(BinderError::InvalidFunctionArguments {
                name: name.to_string(),
                reason: format!("expected {expected} arguments, got {}", args.len()),
            });
        }

        let mut bound = Vec::with_capacity(args.len());
        for (arg, kind) in args.iter().zip(builtin.args) {
            let arg = QueryBinder::bind(arg, ctx)?;
            bound.push(Self::coerce(name, arg, *kind)?);
        }
        if matches!(lowered.as_str(), "round" | "floor" | "ceiling") {
            bound = bound.into_iter().map(Self::integral_to_double).collect();
        }

        let guarded: Vec<Expression> =
            bound.iter().filter(|arg| NullPropagation::needs_guard(arg, ctx)).cloned().collect();
        let call = Expression::call((builtin.method)(), bound);
        Ok(Self::guard(guarded, call))
    }

    /// Fit a bound argument to the position's kind: dynamic values and
    /// untyped nulls are converted, anything else has to match.
    fn coerce(name: &str, arg: Expression, kind: ArgKind) -> Result<Expression> {
        let ty = arg.ty();
        if arg.is_null_constant() {
            return Ok(Expression::null(&kind.canonical()));
        }
        if ty.is_object() {
            return Ok(Expression::convert(arg, kind.canonical()));
        }
        if kind.accepts(&ty) {
            return Ok(arg);
        }
        Err(BinderError::InvalidFunctionArguments {
            name: name.to_string(),
            reason: format!("expected {}, got {ty}", kind.describe()),
        })
    }

    fn integral_to_double(arg: Expression) -> Expression {
        let ty = arg.ty();
        if !ty.is_integral() {
            return arg;
        }
        let target = if ty.is_nullable_value_type() { HostType::Double.to_nullable() } else { HostType::Double };
        Expression::convert(arg, target)
    }

    /// `a == null || b == null ? null : call` over the nullable arguments.
    fn guard(nullable: Vec<Expression>, call: Expression) -> Expression {
        let test = nullable
            .into_iter()
            .map(|arg| {
                let null = Expression::null(&arg.ty());
                Expression::equal(arg, null)
            })
            .reduce(|acc, next| Expression::binary(BinaryOp::OrElse, acc, next, false));
        match test {
            Some(test) => {
                let ty = call.ty().to_nullable();
                Expression::conditional(test, Expression::null(&ty), Expression::convert_if_needed(call, &ty))
            }
            None => call,
        }
    }
}
