use tracing::trace;

use crate::{
    ast::{BinaryOperatorKind, QueryNode},
    binder::{BinderContext, NullPropagation, QueryBinder},
    error::{BinderError, Result},
    expr::{BinaryOp, Expression, Method, UnaryOp, Value},
    model::{EnumType, HostType},
};

/// Common numeric encoding used to compare values of different date/time types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    /// `year * 10000 + month * 100 + day`
    Date,
    /// Tick count of the time of day.
    Time,
}

const TICKS_PER_HOUR: i64 = 36_000_000_000;
const TICKS_PER_MINUTE: i64 = 600_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_PER_MILLISECOND: i64 = 10_000;

pub struct BinaryBinder;

impl BinaryBinder {
    pub fn bind(op: BinaryOperatorKind, left: &QueryNode, right: &QueryNode, ctx: &mut BinderContext) -> Result<Expression> {
        let left = QueryBinder::bind(left, ctx)?;
        let right = QueryBinder::bind(right, ctx)?;
        Self::bind_expressions(op, left, right, ctx)
    }

    pub fn bind_expressions(op: BinaryOperatorKind, left: Expression, right: Expression, ctx: &BinderContext) -> Result<Expression> {
        trace!(?op, left = %left.ty(), right = %right.ty(), "binary operands");
        if op == BinaryOperatorKind::Has {
            return Self::bind_has(left, right, ctx);
        }
        let host = Self::host_op(op)?;
        let (left, right) = Self::unify_enums(left, right)?;
        let (left, right) = Self::unify_nulls(left, right);

        if host.is_logical() {
            return Self::bind_logical(host, left, right);
        }
        if host.is_comparison() {
            if let Some(projection) = Self::projection(&left.ty(), &right.ty()) {
                let (left, right) = Self::promote(Self::project(left, projection), Self::project(right, projection))?;
                return Ok(Self::make(host, left, right, ctx));
            }
            if let Some(compared) = Self::bind_ordinal(host, &left, &right) {
                return Ok(compared);
            }
        }
        let (left, right) = Self::promote(left, right)?;
        Ok(Self::make(host, left, right, ctx))
    }

    fn host_op(op: BinaryOperatorKind) -> Result<BinaryOp> {
        Ok(match op {
            BinaryOperatorKind::Or => BinaryOp::OrElse,
            BinaryOperatorKind::And => BinaryOp::AndAlso,
            BinaryOperatorKind::Equal => BinaryOp::Equal,
            BinaryOperatorKind::NotEqual => BinaryOp::NotEqual,
            BinaryOperatorKind::GreaterThan => BinaryOp::GreaterThan,
            BinaryOperatorKind::GreaterThanOrEqual => BinaryOp::GreaterThanOrEqual,
            BinaryOperatorKind::LessThan => BinaryOp::LessThan,
            BinaryOperatorKind::LessThanOrEqual => BinaryOp::LessThanOrEqual,
            BinaryOperatorKind::Add => BinaryOp::Add,
            BinaryOperatorKind::Subtract => BinaryOp::Subtract,
            BinaryOperatorKind::Multiply => BinaryOp::Multiply,
            BinaryOperatorKind::Divide => BinaryOp::Divide,
            BinaryOperatorKind::Modulo => BinaryOp::Modulo,
            BinaryOperatorKind::Has => return Err(BinderError::unsupported("Has")),
        })
    }

    /// Comparisons of two nullable values lift to null under null propagation.
    fn make(op: BinaryOp, left: Expression, right: Expression, ctx: &BinderContext) -> Expression {
        let lifted = op.is_comparison()
            && ctx.settings.null_propagation
            && left.ty().is_nullable_value_type()
            && right.ty().is_nullable_value_type()
            && !left.is_null_constant()
            && !right.is_null_constant();
        Expression::binary(op, left, right, lifted)
    }

    /// `value has flag`
    fn bind_has(left: Expression, right: Expression, ctx: &BinderContext) -> Result<Expression> {
        let left_ty = left.ty();
        let enum_type = left_ty
            .as_enum()
            .ok_or_else(|| BinderError::type_mismatch("enum", &left_ty))?;
        let flag = if right.ty().as_enum().is_some() {
            right
        } else {
            let value = Self::parse_enum_literal(&right, enum_type)?;
            Expression::typed_constant(
                Value::Enum { type_name: enum_type.name.clone(), value },
                left_ty.non_nullable().clone(),
            )
        };
        let call = Expression::call(Method::HasFlag, vec![left.clone(), flag]);
        Ok(NullPropagation::guard_if_needed(&left, call, ctx))
    }

    /// Enum operands (and the literals compared with them) become values of
    /// the enum's underlying integral type.
    fn unify_enums(left: Expression, right: Expression) -> Result<(Expression, Expression)> {
        let enum_type = match left.ty().as_enum().or(right.ty().as_enum()) {
            Some(e) => e.clone(),
            None => return Ok((left, right)),
        };
        Ok((Self::to_underlying(left, &enum_type)?, Self::to_underlying(right, &enum_type)?))
    }

    fn to_underlying(expr: Expression, enum_type: &EnumType) -> Result<Expression> {
        let ty = expr.ty();
        let underlying = enum_type.underlying.as_ref().clone();
        if expr.is_null_constant() {
            return Ok(Expression::null(&underlying));
        }
        let target = if ty.is_nullable_value_type() { underlying.to_nullable() } else { underlying.clone() };
        if ty.as_enum().is_some() {
            return Ok(Expression::convert(expr, target));
        }
        if ty.is_integral() {
            return Ok(Expression::convert_if_needed(expr, &target));
        }
        let value = Self::parse_enum_literal(&expr, enum_type)?;
        Ok(Expression::typed_constant(Value::from_i128(value as i128, &underlying)?, underlying))
    }

    fn parse_enum_literal(expr: &Expression, enum_type: &EnumType) -> Result<i64> {
        match QueryBinder::constant_value(expr) {
            Some(Value::String(text)) => enum_type.try_parse(text).ok_or_else(|| BinderError::InvalidEnumValue {
                enum_type: enum_type.name.clone(),
                value: text.clone(),
            }),
            _ => Err(BinderError::type_mismatch(&enum_type.name, expr.ty())),
        }
    }

    /// An untyped null literal takes the type of the other operand.
    fn unify_nulls(left: Expression, right: Expression) -> (Expression, Expression) {
        match (left.is_null_constant(), right.is_null_constant()) {
            (true, false) => (Expression::null(&right.ty()), right),
            (false, true) => {
                let null = Expression::null(&left.ty());
                (left, null)
            }
            _ => (left, right),
        }
    }

    fn bind_logical(op: BinaryOp, left: Expression, right: Expression) -> Result<Expression> {
        let as_bool = |e: Expression| -> Result<Expression> {
            let ty = e.ty();
            if ty.is_bool() {
                Ok(e)
            } else if ty.is_object() {
                Ok(Expression::convert(e, HostType::Bool.to_nullable()))
            } else {
                Err(BinderError::type_mismatch(HostType::Bool, ty))
            }
        };
        let (left, right) = (as_bool(left)?, as_bool(right)?);
        if left.ty().is_nullable_value_type() || right.ty().is_nullable_value_type() {
            let nullable = HostType::Bool.to_nullable();
            return Ok(Expression::binary(
                op,
                Expression::convert_if_needed(left, &nullable),
                Expression::convert_if_needed(right, &nullable),
                false,
            ));
        }
        Ok(Expression::binary(op, left, right, false))
    }

    fn projection(left: &HostType, right: &HostType) -> Option<Projection> {
        let (l, r) = (left.non_nullable(), right.non_nullable());
        if l == r {
            return None;
        }
        let has_date = matches!(l, HostType::Date) || matches!(r, HostType::Date);
        let has_time = l.is_time_family() || r.is_time_family();
        let time_like = |t: &HostType| t.is_time_family() || matches!(t, HostType::DateTime | HostType::DateTimeOffset);
        if has_date && l.is_date_family() && r.is_date_family() {
            Some(Projection::Date)
        } else if has_time && time_like(l) && time_like(r) {
            Some(Projection::Time)
        } else {
            None
        }
    }

    fn project(expr: Expression, projection: Projection) -> Expression {
        let ty = expr.ty();
        let key_ty = match projection {
            Projection::Date => HostType::Int32,
            Projection::Time => HostType::Int64,
        };
        if expr.is_null_constant() {
            return Expression::null(&key_ty);
        }
        let key = match projection {
            Projection::Date => {
                let part = |method: Method, scale: i32| {
                    Expression::binary(
                        BinaryOp::Multiply,
                        Expression::call(method, vec![expr.clone()]),
                        Expression::constant(Value::Int32(scale)),
                        false,
                    )
                };
                let year_month = Expression::binary(BinaryOp::Add, part(Method::Year, 10_000), part(Method::Month, 100), false);
                Expression::binary(BinaryOp::Add, year_month, Expression::call(Method::Day, vec![expr.clone()]), false)
            }
            Projection::Time => {
                let part = |method: Method, scale: i64| {
                    Expression::binary(
                        BinaryOp::Multiply,
                        Expression::convert(Expression::call(method, vec![expr.clone()]), HostType::Int64),
                        Expression::constant(Value::Int64(scale)),
                        false,
                    )
                };
                [
                    (Method::Minute, TICKS_PER_MINUTE),
                    (Method::Second, TICKS_PER_SECOND),
                    (Method::Millisecond, TICKS_PER_MILLISECOND),
                ]
                .into_iter()
                .fold(part(Method::Hour, TICKS_PER_HOUR), |acc, (method, scale)| {
                    Expression::binary(BinaryOp::Add, acc, part(method, scale), false)
                })
            }
        };
        if ty.is_nullable_value_type() {
            let nullable = key_ty.to_nullable();
            Expression::conditional(
                Expression::equal(expr.clone(), Expression::null(&ty)),
                Expression::null(&key_ty),
                Expression::convert(key, nullable),
            )
        } else {
            key
        }
    }

    /// Strings and byte arrays have no native ordering: relational operators
    /// go through `Compare(l, r) op 0`, byte equality through `BytesEqual`.
    fn bind_ordinal(op: BinaryOp, left: &Expression, right: &Expression) -> Option<Expression> {
        let (lt, rt) = (left.ty(), right.ty());
        let strings = lt.is_string() && rt.is_string();
        let bytes = lt.is_bytes() && rt.is_bytes();
        if op.is_relational() && (strings || bytes) {
            let compared = Expression::call(Method::Compare, vec![left.clone(), right.clone()]);
            return Some(Expression::binary(op, compared, Expression::constant(Value::Int32(0)), false));
        }
        if bytes {
            let equal = Expression::call(Method::BytesEqual, vec![left.clone(), right.clone()]);
            return Some(match op {
                BinaryOp::NotEqual => Expression::unary(UnaryOp::Not, equal),
                _ => equal,
            });
        }
        None
    }

    /// Bring both operands to one type: numeric promotion, nullable lifting,
    /// or boxing next to a dynamic operand.
    fn promote(left: Expression, right: Expression) -> Result<(Expression, Expression)> {
        let (lt, rt) = (left.ty(), right.ty());
        if lt == rt {
            return Ok((left, right));
        }
        if lt.is_object() || rt.is_object() {
            return Ok((
                Expression::convert_if_needed(left, &HostType::Object),
                Expression::convert_if_needed(right, &HostType::Object),
            ));
        }
        let nullable = lt.is_nullable_value_type() || rt.is_nullable_value_type();
        let target = if lt.is_numeric() && rt.is_numeric() {
            Self::wider(lt.non_nullable(), rt.non_nullable())
        } else if lt.non_nullable() == rt.non_nullable() {
            lt.non_nullable().clone()
        } else if matches!(
            (lt.non_nullable(), rt.non_nullable()),
            (HostType::DateTime, HostType::DateTimeOffset) | (HostType::DateTimeOffset, HostType::DateTime)
        ) {
            HostType::DateTimeOffset
        } else {
            return Err(BinderError::type_mismatch(lt, rt));
        };
        let target = if nullable { target.to_nullable() } else { target };
        Ok((Expression::convert_if_needed(left, &target), Expression::convert_if_needed(right, &target)))
    }

    fn wider(a: &HostType, b: &HostType) -> HostType {
        fn rank(t: &HostType) -> u8 {
            match t {
                HostType::SByte | HostType::Byte | HostType::Int16 | HostType::UInt16 | HostType::Int32 => 0,
                HostType::UInt32 | HostType::Int64 => 1,
                HostType::Single => 2,
                HostType::Double => 3,
                _ => 4,
            }
        }
        match rank(a).max(rank(b)) {
            0 => HostType::Int32,
            1 => HostType::Int64,
            2 => HostType::Single,
            3 => HostType::Double,
            _ => HostType::Decimal,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeDelta};

    use crate::{
        ast::{FilterClause, Literal, RangeVariable, UnaryOperatorKind},
        binder::{
            _tests::{context_for, customer, customer_context, customer_type, customers, int, it, kept_ids, lit, string},
            BinderSettings, FilterBinder,
        },
        expr::{Interpreter, Lambda, Record, Truth},
        model::EdmTypeRef,
    };

    use super::*;

    fn filter(expression: QueryNode) -> Lambda {
        let mut ctx = customer_context();
        FilterBinder::bind(&FilterClause::new(expression, RangeVariable::it(customer_type())), &mut ctx).unwrap()
    }

    fn flags(a: Truth, b: Truth) -> Value {
        Value::record(Record::new("NS.Flags").with("Id", Value::Int32(0)).with("A", a.to_value()).with("B", b.to_value()))
    }

    #[test]
    fn nullable_logic_follows_three_valued_table() {
        let truths = [Truth::True, Truth::False, Truth::Unknown];
        let flags_it = || it(EdmTypeRef::entity("NS.Flags"));
        let a = || QueryNode::property(flags_it(), "A");
        let b = || QueryNode::property(flags_it(), "B");

        for (op, expected) in [
            (BinaryOperatorKind::Or, Truth::or as fn(Truth, Truth) -> Truth),
            (BinaryOperatorKind::And, Truth::and),
            (BinaryOperatorKind::Equal, Truth::lifted_eq),
        ] {
            let mut ctx = context_for(&EdmTypeRef::entity("NS.Flags"), BinderSettings::new());
            let body = BinaryBinder::bind(op, &a(), &b(), &mut ctx).unwrap();
            assert_eq!(body.ty(), HostType::Bool.to_nullable());
            let lambda = Lambda::new(ctx.current().clone(), body);
            for x in truths {
                for y in truths {
                    let got = Interpreter::invoke(&lambda, flags(x, y)).unwrap();
                    assert_eq!(Truth::from_value(&got), Some(expected(x, y)), "{x} {op:?} {y}");
                }
            }
        }

        let mut ctx = context_for(&EdmTypeRef::entity("NS.Flags"), BinderSettings::new());
        let not = QueryBinder::bind(&QueryNode::unary(UnaryOperatorKind::Not, a()), &mut ctx).unwrap();
        let lambda = Lambda::new(ctx.current().clone(), not);
        for x in truths {
            let got = Interpreter::invoke(&lambda, flags(x, Truth::True)).unwrap();
            assert_eq!(Truth::from_value(&got), Some(!x));
        }
    }

    #[test]
    fn equality_against_null_literal_is_not_lifted() {
        let predicate = filter(QueryNode::binary(BinaryOperatorKind::Equal, customer("Age"), QueryNode::null(None)));
        assert_eq!(kept_ids(&predicate, &customers()), vec![2]);
    }

    #[test]
    fn mixed_width_numbers_are_promoted() {
        let mut ctx = customer_context();
        let sum = BinaryBinder::bind(BinaryOperatorKind::Add, &customer("Age"), &customer("Rank"), &mut ctx).unwrap();
        assert_eq!(sum.ty(), HostType::Int64.to_nullable());

        let predicate = filter(QueryNode::binary(BinaryOperatorKind::GreaterThan, customer("Rank"), int(1)));
        assert_eq!(kept_ids(&predicate, &customers()), vec![1, 3]);
    }

    #[test]
    fn enums_compare_through_their_underlying_value() {
        let red = filter(QueryNode::binary(BinaryOperatorKind::Equal, customer("Color"), lit(Literal::enumeration("NS.Color", "Red"))));
        assert_eq!(kept_ids(&red, &customers()), vec![2]);

        let by_name = filter(QueryNode::binary(BinaryOperatorKind::Equal, customer("Color"), string("Green")));
        assert_eq!(kept_ids(&by_name, &customers()), vec![1]);

        let has_blue = filter(QueryNode::binary(BinaryOperatorKind::Has, customer("Color"), lit(Literal::enumeration("NS.Color", "Blue"))));
        assert!(has_blue.to_string().contains("HasFlag("));
        assert_eq!(kept_ids(&has_blue, &customers()), vec![3]);

        let mut ctx = customer_context();
        let bad = BinaryBinder::bind(BinaryOperatorKind::Equal, &customer("Color"), &string("Pink"), &mut ctx);
        assert!(matches!(bad, Err(BinderError::InvalidEnumValue { .. })));
    }

    #[test]
    fn strings_and_bytes_order_through_compare() {
        let after_b = filter(QueryNode::binary(BinaryOperatorKind::GreaterThan, customer("Name"), string("B")));
        assert!(after_b.to_string().contains("Compare($it.Name, \"B\")"));
        assert_eq!(kept_ids(&after_b, &customers()), vec![1]);

        let photo = QueryNode::constant(Literal::Binary(vec![1, 2]));
        let same = filter(QueryNode::binary(BinaryOperatorKind::Equal, customer("Photo"), photo.clone()));
        assert_eq!(kept_ids(&same, &customers()), vec![1]);
        let different = filter(QueryNode::binary(BinaryOperatorKind::NotEqual, customer("Photo"), photo.clone()));
        assert_eq!(kept_ids(&different, &customers()), vec![2, 3]);
        let smaller = filter(QueryNode::binary(BinaryOperatorKind::LessThan, customer("Photo"), photo));
        assert_eq!(kept_ids(&smaller, &customers()), Vec::<i32>::new());
    }

    #[test]
    fn date_against_offset_compares_calendar_days() {
        // Joined carries an offset; only its calendar date matters
        let since = QueryNode::binary(BinaryOperatorKind::Equal, customer("Since"), customer("Joined"));
        let predicate = filter(since);
        assert!(predicate.to_string().contains("Year("));
        assert_eq!(kept_ids(&predicate, &customers()), vec![1, 3]);

        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let before = filter(QueryNode::binary(BinaryOperatorKind::LessThan, customer("Since"), lit(Literal::Date(day))));
        assert_eq!(kept_ids(&before, &customers()), vec![3]);
    }

    #[test]
    fn time_of_day_comparisons_use_ticks() {
        let noon = || lit(Literal::TimeOfDay(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        let morning = filter(QueryNode::binary(BinaryOperatorKind::LessThan, customer("Joined"), noon()));
        assert!(morning.to_string().contains("Hour("));
        assert_eq!(kept_ids(&morning, &customers()), vec![1, 2]);

        let span = lit(Literal::Duration(TimeDelta::minutes(150)));
        let shorter = filter(QueryNode::binary(BinaryOperatorKind::LessThan, span.clone(), noon()));
        assert_eq!(kept_ids(&shorter, &customers()), vec![1, 2, 3]);
        let longer = filter(QueryNode::binary(BinaryOperatorKind::GreaterThan, span, noon()));
        assert!(kept_ids(&longer, &customers()).is_empty());
    }

    #[test]
    fn logical_operands_must_be_boolean() {
        let mut ctx = customer_context();
        let err = BinaryBinder::bind(BinaryOperatorKind::And, &customer("Name"), &customer("Age"), &mut ctx).unwrap_err();
        assert!(matches!(err, BinderError::TypeMismatch { .. }));
    }
}
