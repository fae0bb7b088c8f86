use std::{cmp::Ordering, sync::Arc};

use chrono::{Datelike, NaiveTime, Timelike};
use indexmap::IndexMap;
use regex::Regex;
use tracing::trace;

use crate::{
    container::{self, Wrapper},
    error::{BinderError, Result},
    expr::{
        aggregates::{Accumulator, AggregateRegistry},
        BinaryOp, Expression, Grouping, Lambda, Method, Truth, UnaryOp, Value,
    },
    model::{HostType, ModelResolver},
};

/// In-memory evaluator for bound expressions.
///
/// Follows the usual host semantics: member access on null fails, comparisons
/// are lifted (`null == null` is true unless the node is lifted to null) and
/// nullable booleans combine with three-valued logic.
#[derive(Debug, Default)]
pub struct Interpreter {
    bindings: Vec<(u32, Value)>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke a single-parameter lambda on `arg`.
    pub fn invoke(lambda: &Lambda, arg: Value) -> Result<Value> {
        Self::new().apply(lambda, arg)
    }

    /// Keep the items for which `predicate` evaluates to `true`.
    pub fn filter(predicate: &Lambda, items: &[Value]) -> Result<Vec<Value>> {
        let mut interpreter = Self::new();
        let mut kept = Vec::new();
        for item in items {
            if interpreter.apply(predicate, item.clone())? == Value::Bool(true) {
                kept.push(item.clone());
            }
        }
        Ok(kept)
    }

    pub fn apply(&mut self, lambda: &Lambda, arg: Value) -> Result<Value> {
        let parameter = lambda
            .parameter()
            .ok_or_else(|| BinderError::evaluation("lambda without parameter"))?;
        self.bindings.push((parameter.id, arg));
        let result = self.evaluate(&lambda.body);
        self.bindings.pop();
        result
    }

    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Constant { value, .. } | Expression::Captured { value, .. } => Ok(value.clone()),
            Expression::Parameter(p) => self
                .bindings
                .iter()
                .rev()
                .find(|(id, _)| *id == p.id)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| BinderError::evaluation(format!("unbound parameter {}", p.name))),
            Expression::Member { source, member } => {
                let source = self.evaluate(source)?;
                Self::member(&source, &member.name)
            }
            Expression::Index { source, key } => {
                let source = self.evaluate(source)?;
                let key = self.evaluate(key)?;
                match (&source, key.as_str()) {
                    (Value::Dictionary(d), Some(k)) => d
                        .get(k)
                        .cloned()
                        .ok_or_else(|| BinderError::evaluation(format!("key '{k}' not found"))),
                    (Value::Null, _) => Err(BinderError::evaluation("indexing a null dictionary")),
                    _ => Err(BinderError::evaluation(format!("cannot index {source} with {key}"))),
                }
            }
            Expression::Binary { op, left, right, lifted_to_null, ty } => {
                self.binary(*op, left, right, *lifted_to_null, ty)
            }
            Expression::Unary { op, operand, .. } => {
                let v = self.evaluate(operand)?;
                match (op, &v) {
                    (_, Value::Null) => Ok(Value::Null),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Negate, Value::TimeSpan(span)) => Ok(Value::TimeSpan(-*span)),
                    (UnaryOp::Negate, v) if v.is_integral() => {
                        let ty = v.host_type().unwrap_or(HostType::Int64);
                        Value::from_i128(-v.as_i128().unwrap_or_default(), &ty)
                    }
                    (UnaryOp::Negate, v) => match (v.as_f64(), v.host_type()) {
                        (Some(f), Some(ty)) => Value::from_f64(-f, &ty),
                        _ => Err(BinderError::evaluation(format!("cannot negate {v}"))),
                    },
                    (UnaryOp::Not, v) => Err(BinderError::evaluation(format!("cannot apply not to {v}"))),
                }
            }
            Expression::Convert { operand, ty } => {
                let v = self.evaluate(operand)?;
                convert_value(v, ty)
            }
            Expression::TypeIs { operand, target } => {
                let v = self.evaluate(operand)?;
                Ok(Value::Bool(v.is_instance_of(target)))
            }
            Expression::TypeAs { operand, ty } => {
                let v = self.evaluate(operand)?;
                Ok(if v.is_instance_of(ty) { v } else { Value::Null })
            }
            Expression::Conditional { test, if_true, if_false, .. } => match self.evaluate(test)? {
                Value::Bool(true) => self.evaluate(if_true),
                Value::Bool(false) => self.evaluate(if_false),
                other => Err(BinderError::evaluation(format!("conditional test evaluated to {other}"))),
            },
            Expression::Call { method, args, ty } => self.call(method, args, ty),
            Expression::Lambda(_) => Err(BinderError::evaluation("a lambda is not a value")),
            Expression::Container(slot) => {
                let slot = slot.try_map(|e| self.evaluate(e))?;
                Ok(Value::Container(Arc::new(slot)))
            }
            Expression::Wrapper(w) => {
                let w = w.try_map(|e| self.evaluate(e))?;
                Ok(Value::Wrapper(Arc::new(w)))
            }
            Expression::Slot { container, name, .. } => match self.evaluate(container)? {
                Value::Container(c) => c
                    .get(name)
                    .cloned()
                    .ok_or_else(|| BinderError::evaluation(format!("container has no slot '{name}'"))),
                other => Err(BinderError::evaluation(format!("cannot read slot '{name}' of {other}"))),
            },
        }
    }

    fn member(source: &Value, name: &str) -> Result<Value> {
        let missing = || BinderError::evaluation(format!("{source} has no member '{name}'"));
        match source {
            Value::Null => Err(BinderError::evaluation(format!("null reference reading member '{name}'"))),
            Value::Record(r) => r.get(name).cloned().ok_or_else(missing),
            Value::Grouping(g) if name == container::KEY => Ok(g.key.clone()),
            Value::Wrapper(w) => Self::wrapper_member(w, name).ok_or_else(missing),
            _ => Err(missing()),
        }
    }

    fn wrapper_member(w: &Wrapper<Value>, name: &str) -> Option<Value> {
        let member = match name {
            container::GROUP_BY_CONTAINER => &w.group_by_container,
            container::CONTAINER => &w.container,
            container::SOURCE => &w.source,
            container::INSTANCE => &w.instance,
            container::MODEL => &w.model,
            _ => return None,
        };
        Some(member.clone().unwrap_or(Value::Null))
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        lifted_to_null: bool,
        ty: &HostType,
    ) -> Result<Value> {
        if op.is_logical() {
            return self.logical(op, left, right, ty);
        }
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;
        trace!(?op, %l, %r, "binary");

        if op.is_comparison() {
            if l.is_null() || r.is_null() {
                if lifted_to_null {
                    return Ok(Value::Null);
                }
                let both = l.is_null() && r.is_null();
                return Ok(Value::Bool(match op {
                    BinaryOp::Equal => both,
                    BinaryOp::NotEqual => !both,
                    _ => false,
                }));
            }
            let result = match op {
                BinaryOp::Equal => values_equal(&l, &r),
                BinaryOp::NotEqual => !values_equal(&l, &r),
                _ => {
                    let ord = l
                        .compare(&r)
                        .ok_or_else(|| BinderError::evaluation(format!("cannot compare {l} and {r}")))?;
                    match op {
                        BinaryOp::LessThan => ord == Ordering::Less,
                        BinaryOp::LessThanOrEqual => ord != Ordering::Greater,
                        BinaryOp::GreaterThan => ord == Ordering::Greater,
                        _ => ord != Ordering::Less,
                    }
                }
            };
            return Ok(Value::Bool(result));
        }

        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }
        arithmetic(op, &l, &r, ty.non_nullable())
    }

    fn logical(&mut self, op: BinaryOp, left: &Expression, right: &Expression, ty: &HostType) -> Result<Value> {
        let l = self.evaluate(left)?;
        if !ty.is_nullable_value_type() {
            // short-circuit on plain booleans
            return match (op, l) {
                (BinaryOp::AndAlso, Value::Bool(false)) => Ok(Value::Bool(false)),
                (BinaryOp::OrElse, Value::Bool(true)) => Ok(Value::Bool(true)),
                (_, Value::Bool(_)) => match self.evaluate(right)? {
                    Value::Bool(b) => Ok(Value::Bool(b)),
                    other => Err(BinderError::evaluation(format!("expected a boolean, got {other}"))),
                },
                (_, other) => Err(BinderError::evaluation(format!("expected a boolean, got {other}"))),
            };
        }
        let r = self.evaluate(right)?;
        let as_truth = |v: &Value| {
            Truth::from_value(v).ok_or_else(|| BinderError::evaluation(format!("expected a boolean, got {v}")))
        };
        let (a, b) = (as_truth(&l)?, as_truth(&r)?);
        Ok(match op {
            BinaryOp::AndAlso => a.and(b),
            _ => a.or(b),
        }
        .to_value())
    }

    fn lambda_arg<'a>(method: &Method, args: &'a [Expression], i: usize) -> Result<&'a Lambda> {
        match args.get(i) {
            Some(Expression::Lambda(l)) => Ok(l),
            _ => Err(BinderError::evaluation(format!("{method} expects a lambda argument"))),
        }
    }

    /// Evaluate the source of a collection operator.
    fn items(&mut self, method: &Method, args: &[Expression]) -> Result<Vec<Value>> {
        let source = args
            .first()
            .ok_or_else(|| BinderError::evaluation(format!("{method} without source")))?;
        match self.evaluate(source)? {
            Value::Collection(items) => Ok(items.as_ref().clone()),
            Value::Grouping(g) => Ok(g.items.clone()),
            Value::Null => Err(BinderError::evaluation(format!("{method} over a null source"))),
            other => Err(BinderError::evaluation(format!("{method} over non-collection {other}"))),
        }
    }

    /// Apply the optional selector at `args[1]` to every item.
    fn selected(&mut self, method: &Method, args: &[Expression]) -> Result<Vec<Value>> {
        let items = self.items(method, args)?;
        match args.get(1) {
            None => Ok(items),
            Some(_) => {
                let selector = Self::lambda_arg(method, args, 1)?;
                items.into_iter().map(|item| self.apply(selector, item)).collect()
            }
        }
    }

    fn aggregate(&mut self, mut acc: Box<dyn Accumulator>, method: &Method, args: &[Expression]) -> Result<Value> {
        for value in self.selected(method, args)? {
            acc.update(&value)?;
        }
        acc.finalize()
    }

    fn call(&mut self, method: &Method, args: &[Expression], ty: &HostType) -> Result<Value> {
        match method {
            Method::Any => {
                let items = self.items(method, args)?;
                if args.len() < 2 {
                    return Ok(Value::Bool(!items.is_empty()));
                }
                let predicate = Self::lambda_arg(method, args, 1)?;
                for item in items {
                    if self.apply(predicate, item)? == Value::Bool(true) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Method::All => {
                let items = self.items(method, args)?;
                let predicate = Self::lambda_arg(method, args, 1)?;
                for item in items {
                    if self.apply(predicate, item)? != Value::Bool(true) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Method::Where => {
                let items = self.items(method, args)?;
                let predicate = Self::lambda_arg(method, args, 1)?;
                let mut kept = Vec::new();
                for item in items {
                    if self.apply(predicate, item.clone())? == Value::Bool(true) {
                        kept.push(item);
                    }
                }
                Ok(Value::collection(kept))
            }
            Method::Select => Ok(Value::collection(self.selected(method, args)?)),
            Method::SelectMany => {
                let mut flat = Vec::new();
                for inner in self.selected(method, args)? {
                    match inner {
                        Value::Collection(items) => flat.extend(items.iter().cloned()),
                        other => {
                            return Err(BinderError::evaluation(format!("SelectMany selector returned {other}")));
                        }
                    }
                }
                Ok(Value::collection(flat))
            }
            Method::GroupBy => {
                let items = self.items(method, args)?;
                let key_selector = Self::lambda_arg(method, args, 1)?;
                let mut groups: Vec<Grouping> = Vec::new();
                for item in items {
                    let key = self.apply(key_selector, item.clone())?;
                    match groups.iter_mut().find(|g| g.key.loosely_equals(&key)) {
                        Some(group) => group.items.push(item),
                        None => groups.push(Grouping { key, items: vec![item] }),
                    }
                }
                Ok(Value::collection(groups.into_iter().map(|g| Value::Grouping(Arc::new(g))).collect()))
            }
            Method::CollectionContains => {
                let items = self.items(method, args)?;
                let probe = self.arg(method, args, 1)?;
                Ok(Value::Bool(items.iter().any(|item| item.loosely_equals(&probe))))
            }
            Method::CastElements(target) => {
                let items = self.items(method, args)?;
                Ok(Value::collection(
                    items.into_iter().map(|item| convert_value(item, target)).collect::<Result<_>>()?,
                ))
            }
            Method::Distinct => {
                let mut distinct: Vec<Value> = Vec::new();
                for item in self.items(method, args)? {
                    if !distinct.iter().any(|d| d.loosely_equals(&item)) {
                        distinct.push(item);
                    }
                }
                Ok(Value::collection(distinct))
            }
            Method::ToList => Ok(Value::collection(self.items(method, args)?)),
            Method::LongCount | Method::Sum | Method::Average | Method::Min | Method::Max => {
                let name = match method {
                    Method::LongCount => "count",
                    Method::Sum => "sum",
                    Method::Average => "average",
                    Method::Min => "min",
                    _ => "max",
                };
                let imp = AggregateRegistry::built_ins()
                    .get(name)
                    .ok_or_else(|| BinderError::evaluation(format!("aggregate '{name}' is not registered")))?;
                self.aggregate(imp.create_accumulator(ty), method, args)
            }
            Method::Custom(m) => self.aggregate(m.create_accumulator(), method, args),
            Method::ContainsKey => {
                let dict = self.arg(method, args, 0)?;
                let key = self.arg(method, args, 1)?;
                match (&dict, key.as_str()) {
                    (Value::Dictionary(d), Some(k)) => Ok(Value::Bool(d.contains_key(k))),
                    (Value::Null, _) => Err(BinderError::evaluation("ContainsKey on a null dictionary")),
                    _ => Err(BinderError::evaluation(format!("ContainsKey on {dict}"))),
                }
            }
            Method::HasDeclaredProperty => {
                let model = self.model_arg(method, args, 0)?;
                let instance = self.arg(method, args, 1)?;
                let name = self.string_arg(method, args, 2)?;
                Ok(Value::Bool(has_declared_property(model.as_ref(), &instance, &name)?))
            }
            Method::DeclaredProperty => {
                let instance = self.arg(method, args, 0)?;
                let name = self.string_arg(method, args, 1)?;
                Self::member(&instance, &name)
            }
            Method::DynamicProperty => {
                let model = self.model_arg(method, args, 0)?;
                let instance = self.arg(method, args, 1)?;
                let name = self.string_arg(method, args, 2)?;
                dynamic_property(model.as_ref(), &instance, &name)
            }
            _ => {
                let values = args.iter().map(|a| self.evaluate(a)).collect::<Result<Vec<_>>>()?;
                scalar_call(method, &values)
            }
        }
    }

    fn arg(&mut self, method: &Method, args: &[Expression], i: usize) -> Result<Value> {
        let arg = args
            .get(i)
            .ok_or_else(|| BinderError::evaluation(format!("{method} is missing argument {i}")))?;
        self.evaluate(arg)
    }

    fn string_arg(&mut self, method: &Method, args: &[Expression], i: usize) -> Result<String> {
        match self.arg(method, args, i)? {
            Value::String(s) => Ok(s),
            other => Err(BinderError::evaluation(format!("{method} expects a string, got {other}"))),
        }
    }

    fn model_arg(&mut self, method: &Method, args: &[Expression], i: usize) -> Result<Arc<dyn ModelResolver>> {
        match self.arg(method, args, i)? {
            Value::Model(handle) => Ok(handle.0),
            other => Err(BinderError::evaluation(format!("{method} expects the model, got {other}"))),
        }
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match l.compare(r) {
        Some(ord) => ord == Ordering::Equal,
        None => l == r,
    }
}

fn has_declared_property(model: &dyn ModelResolver, instance: &Value, name: &str) -> Result<bool> {
    match instance {
        Value::Record(r) => {
            if !model.has_record_type(&r.type_name) {
                return Err(BinderError::ResourceTypeNotInModel(r.type_name.clone()));
            }
            let is_dynamic_bag = model
                .dynamic_property_member(&r.type_name)
                .is_some_and(|m| m.name == name);
            Ok(!is_dynamic_bag && model.resolve_member(&r.type_name, name).is_some())
        }
        _ => Ok(false),
    }
}

fn dynamic_property(model: &dyn ModelResolver, instance: &Value, name: &str) -> Result<Value> {
    let lookup = |bag: &IndexMap<String, Value>| bag.get(name).cloned().unwrap_or(Value::Null);
    match instance {
        Value::Null => Ok(Value::Null),
        Value::Dictionary(bag) => Ok(lookup(bag)),
        Value::Record(r) => {
            if !model.has_record_type(&r.type_name) {
                return Err(BinderError::ResourceTypeNotInModel(r.type_name.clone()));
            }
            let member = match model.dynamic_property_member(&r.type_name) {
                Some(m) => m,
                None => return Ok(Value::Null),
            };
            match r.get(&member.name) {
                Some(Value::Dictionary(bag)) => Ok(lookup(bag)),
                _ => Ok(Value::Null),
            }
        }
        _ => Ok(Value::Null),
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value, ty: &HostType) -> Result<Value> {
    match (op, l, r) {
        (BinaryOp::Add, Value::TimeSpan(a), Value::TimeSpan(b)) => return Ok(Value::TimeSpan(*a + *b)),
        (BinaryOp::Subtract, Value::TimeSpan(a), Value::TimeSpan(b)) => return Ok(Value::TimeSpan(*a - *b)),
        (BinaryOp::Add, Value::DateTimeOffset(a), Value::TimeSpan(b)) => return Ok(Value::DateTimeOffset(*a + *b)),
        (BinaryOp::Subtract, Value::DateTimeOffset(a), Value::TimeSpan(b)) => {
            return Ok(Value::DateTimeOffset(*a - *b));
        }
        (BinaryOp::Subtract, Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => {
            return Ok(Value::TimeSpan(a.signed_duration_since(*b)));
        }
        (BinaryOp::Add, Value::Date(a), Value::TimeSpan(b)) => return Ok(Value::Date(*a + *b)),
        (BinaryOp::Subtract, Value::Date(a), Value::TimeSpan(b)) => return Ok(Value::Date(*a - *b)),
        _ => {}
    }

    let invalid = || BinderError::evaluation(format!("cannot apply {} to {l} and {r}", op.symbol()));
    if l.is_integral() && r.is_integral() && ty.is_integral() {
        let (a, b) = (l.as_i128().ok_or_else(invalid)?, r.as_i128().ok_or_else(invalid)?);
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Divide => a.checked_div(b),
            BinaryOp::Modulo => a.checked_rem(b),
            _ => None,
        }
        .ok_or_else(|| BinderError::evaluation(format!("arithmetic overflow or division by zero: {l} {} {r}", op.symbol())))?;
        return Value::from_i128(result, ty);
    }
    let (a, b) = (l.as_f64().ok_or_else(invalid)?, r.as_f64().ok_or_else(invalid)?);
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide if b == 0.0 && matches!(ty, HostType::Decimal) => {
            return Err(BinderError::evaluation("decimal division by zero"));
        }
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        _ => return Err(invalid()),
    };
    let target = if ty.is_numeric() { ty.clone() } else { HostType::Double };
    Value::from_f64(result, &target)
}

fn midnight() -> Result<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(0, 0).ok_or_else(|| BinderError::evaluation("invalid midnight"))
}

/// Host conversion of a value to `target`.
pub fn convert_value(v: Value, target: &HostType) -> Result<Value> {
    if v.is_null() {
        return if target.is_nullable() {
            Ok(Value::Null)
        } else {
            Err(BinderError::evaluation(format!("null cannot be converted to {target}")))
        };
    }
    let t = target.non_nullable();
    if t.is_object() || (v.is_instance_of(t) && !matches!(t, HostType::Collection(_))) {
        return Ok(v);
    }
    let invalid = || BinderError::evaluation(format!("invalid cast from {v} to {target}"));
    match (&v, t) {
        (Value::Enum { value, .. }, t) if t.is_integral() => Value::from_i128(*value as i128, t),
        (Value::Enum { type_name, .. }, HostType::Enum(e)) if *type_name != e.name => Err(invalid()),
        (v, HostType::Enum(e)) if v.is_integral() => Ok(Value::Enum {
            type_name: e.name.clone(),
            value: i64::try_from(v.as_i128().ok_or_else(invalid)?).map_err(|_| invalid())?,
        }),
        (v, t) if t.is_numeric() && v.is_integral() => Value::from_i128(v.as_i128().ok_or_else(invalid)?, t),
        (v, t) if t.is_numeric() && v.as_f64().is_some() && !matches!(v, Value::Enum { .. }) => {
            Value::from_f64(v.as_f64().ok_or_else(invalid)?, t)
        }
        (Value::Char(c), HostType::String) => Ok(Value::String(c.to_string())),
        (Value::CharArray(chars), HostType::String) => Ok(Value::String(chars.iter().collect())),
        (Value::Xml(s), HostType::String) => Ok(Value::String(s.clone())),
        (Value::DateTime(dt), HostType::Date) => Ok(Value::Date(dt.date())),
        (Value::DateTimeOffset(dto), HostType::Date) => Ok(Value::Date(dto.date_naive())),
        (Value::DateTimeOffset(dto), HostType::DateTime) => Ok(Value::DateTime(dto.naive_local())),
        (Value::DateTimeOffset(dto), HostType::TimeOfDay) => Ok(Value::TimeOfDay(dto.time())),
        (Value::DateTime(dt), HostType::DateTimeOffset) => Ok(Value::DateTimeOffset(dt.and_utc().fixed_offset())),
        (Value::Date(d), HostType::DateTime) => Ok(Value::DateTime(d.and_time(midnight()?))),
        (Value::Date(d), HostType::DateTimeOffset) => {
            Ok(Value::DateTimeOffset(d.and_time(midnight()?).and_utc().fixed_offset()))
        }
        (Value::TimeOfDay(time), HostType::TimeSpan) => Ok(Value::TimeSpan(time.signed_duration_since(midnight()?))),
        (Value::TimeSpan(span), HostType::TimeOfDay) => Ok(Value::TimeOfDay(midnight()? + *span)),
        (Value::Collection(items), HostType::Collection(element)) => Ok(Value::collection(
            items.iter().map(|i| convert_value(i.clone(), element)).collect::<Result<_>>()?,
        )),
        _ => Err(invalid()),
    }
}

fn date_parts(v: &Value) -> Option<(i32, u32, u32)> {
    match v {
        Value::Date(d) => Some((d.year(), d.month(), d.day())),
        Value::DateTime(dt) => Some((dt.year(), dt.month(), dt.day())),
        Value::DateTimeOffset(dto) => Some((dto.year(), dto.month(), dto.day())),
        _ => None,
    }
}

/// (hour, minute, second, nanosecond) of a time-bearing value.
fn time_parts(v: &Value) -> Option<(i64, i64, i64, i64)> {
    let of = |t: NaiveTime| (t.hour() as i64, t.minute() as i64, t.second() as i64, t.nanosecond() as i64);
    match v {
        Value::TimeOfDay(t) => Some(of(*t)),
        Value::DateTime(dt) => Some(of(dt.time())),
        Value::DateTimeOffset(dto) => Some(of(dto.time())),
        Value::TimeSpan(span) => {
            let nanos = span.subsec_nanos() as i64;
            Some((span.num_hours() % 24, span.num_minutes() % 60, span.num_seconds() % 60, nanos))
        }
        _ => None,
    }
}

fn scalar_call(method: &Method, values: &[Value]) -> Result<Value> {
    let bad = || {
        let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        BinderError::evaluation(format!("{method} cannot be applied to ({})", rendered.join(", ")))
    };
    let int = |i: i64| Value::Int32(i as i32);

    match (method, values) {
        (Method::Contains, [Value::String(s), Value::String(sub)]) => Ok(Value::Bool(s.contains(sub.as_str()))),
        (Method::StartsWith, [Value::String(s), Value::String(p)]) => Ok(Value::Bool(s.starts_with(p.as_str()))),
        (Method::EndsWith, [Value::String(s), Value::String(p)]) => Ok(Value::Bool(s.ends_with(p.as_str()))),
        (Method::Length, [Value::String(s)]) => Ok(int(s.chars().count() as i64)),
        (Method::IndexOf, [Value::String(s), Value::String(sub)]) => Ok(int(match s.find(sub.as_str()) {
            Some(byte) => s[..byte].chars().count() as i64,
            None => -1,
        })),
        (Method::Substring, [Value::String(s), start, rest @ ..]) => {
            let start = start.as_i128().ok_or_else(bad)?;
            let chars: Vec<char> = s.chars().collect();
            let start = usize::try_from(start).map_err(|_| bad())?.min(chars.len());
            let end = match rest {
                [] => chars.len(),
                [len] => {
                    let len = len.as_i128().filter(|len| *len >= 0).ok_or_else(bad)?;
                    start.saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
                }
                _ => return Err(bad()),
            }
            .min(chars.len());
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        (Method::ToLower, [Value::String(s)]) => Ok(Value::String(s.to_lowercase())),
        (Method::ToUpper, [Value::String(s)]) => Ok(Value::String(s.to_uppercase())),
        (Method::Trim, [Value::String(s)]) => Ok(Value::String(s.trim().to_string())),
        (Method::Concat, [a, b]) => Ok(Value::String(format!(
            "{}{}",
            a.as_str().unwrap_or_default(),
            b.as_str().unwrap_or_default()
        ))),
        (Method::MatchesPattern, [Value::String(s), Value::String(pattern)]) => {
            let re = Regex::new(pattern).map_err(|e| BinderError::evaluation(format!("invalid pattern: {e}")))?;
            Ok(Value::Bool(re.is_match(s)))
        }
        (Method::Year, [v]) => date_parts(v).map(|(y, _, _)| int(y as i64)).ok_or_else(bad),
        (Method::Month, [v]) => date_parts(v).map(|(_, m, _)| int(m as i64)).ok_or_else(bad),
        (Method::Day, [v]) => date_parts(v).map(|(_, _, d)| int(d as i64)).ok_or_else(bad),
        (Method::Hour, [v]) => time_parts(v).map(|(h, ..)| int(h)).ok_or_else(bad),
        (Method::Minute, [v]) => time_parts(v).map(|(_, m, ..)| int(m)).ok_or_else(bad),
        (Method::Second, [v]) => time_parts(v).map(|(_, _, s, _)| int(s)).ok_or_else(bad),
        (Method::Millisecond, [v]) => time_parts(v).map(|(.., n)| int(n / 1_000_000)).ok_or_else(bad),
        (Method::FractionalSeconds, [v]) => {
            let (.., nanos) = time_parts(v).ok_or_else(bad)?;
            Ok(Value::decimal(nanos as f64 / 1e9))
        }
        (Method::DatePart, [v]) => convert_value(v.clone(), &HostType::Date),
        (Method::TimePart, [v]) => convert_value(v.clone(), &HostType::TimeOfDay),
        (Method::Round | Method::Floor | Method::Ceiling, [v]) => {
            let ty = v.host_type().ok_or_else(bad)?;
            if v.is_integral() {
                return Ok(v.clone());
            }
            let f = v.as_f64().ok_or_else(bad)?;
            let r = match method {
                Method::Round => f.round_ties_even(),
                Method::Floor => f.floor(),
                _ => f.ceil(),
            };
            Value::from_f64(r, &ty)
        }
        (Method::Compare, [a, b]) => {
            let ord = match (a, b) {
                (Value::Null, Value::Null) => Ordering::Equal,
                (Value::Null, _) => Ordering::Less,
                (_, Value::Null) => Ordering::Greater,
                (a, b) => a.compare(b).ok_or_else(bad)?,
            };
            Ok(Value::Int32(ord as i32))
        }
        (Method::BytesEqual, [a, b]) => match (a, b) {
            (Value::Null, Value::Null) => Ok(Value::Bool(true)),
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Bool(false)),
            (Value::Bytes(x), Value::Bytes(y)) => Ok(Value::Bool(x == y)),
            _ => Err(bad()),
        },
        (Method::HasFlag, [value, flag]) => {
            let (v, f) = (value.as_i128().ok_or_else(bad)?, flag.as_i128().ok_or_else(bad)?);
            Ok(Value::Bool((v & f) == f))
        }
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    use crate::{
        container::ContainerSlot,
        expr::{ModelHandle, Parameter, Record},
        model::{HostMember, RecordSchema, SchemaModel},
    };

    fn eval(e: &Expression) -> Result<Value> {
        Interpreter::new().evaluate(e)
    }

    fn nullable_bool(t: Truth) -> Expression {
        Expression::typed_constant(t.to_value(), HostType::Bool.to_nullable())
    }

    #[test]
    fn lifted_logic_matches_truth_table() {
        use Truth::*;
        let cases = [
            (BinaryOp::OrElse, True, Unknown, True),
            (BinaryOp::OrElse, Unknown, True, True),
            (BinaryOp::OrElse, False, False, False),
            (BinaryOp::OrElse, False, Unknown, Unknown),
            (BinaryOp::OrElse, Unknown, Unknown, Unknown),
            (BinaryOp::AndAlso, Unknown, False, False),
            (BinaryOp::AndAlso, True, Unknown, Unknown),
            (BinaryOp::AndAlso, True, True, True),
        ];
        for (op, a, b, expected) in cases {
            let e = Expression::binary(op, nullable_bool(a), nullable_bool(b), false);
            assert_eq!(eval(&e).unwrap(), expected.to_value(), "{a} {op:?} {b}");
        }
    }

    #[test]
    fn comparisons_lift_only_when_requested() {
        let null = Expression::null(&HostType::Int32);
        let lifted = Expression::binary(BinaryOp::Equal, null.clone(), null.clone(), true);
        assert_eq!(eval(&lifted).unwrap(), Value::Null);
        let plain = Expression::binary(BinaryOp::Equal, null.clone(), null.clone(), false);
        assert_eq!(eval(&plain).unwrap(), Value::Bool(true));
        let lt = Expression::binary(BinaryOp::LessThan, null, Expression::constant(Value::Int32(1)), false);
        assert_eq!(eval(&lt).unwrap(), Value::Bool(false));
    }

    #[test]
    fn member_access_on_null_fails() {
        let p = Parameter::new("$it", HostType::record("NS.T"));
        let body = Expression::member(Expression::parameter(&p), HostMember::new("NS.T", "Name", HostType::String));
        let lambda = Lambda::new(p, body);
        assert!(Interpreter::invoke(&lambda, Value::Null).is_err());
        let rec = Value::record(Record::new("NS.T").with("Name", Value::string("Sam")));
        assert_eq!(Interpreter::invoke(&lambda, rec).unwrap(), Value::string("Sam"));
    }

    #[test]
    fn integer_arithmetic_keeps_type_and_checks_division() {
        let add = Expression::binary(
            BinaryOp::Add,
            Expression::constant(Value::Int32(2)),
            Expression::constant(Value::Int32(3)),
            false,
        );
        assert_eq!(eval(&add).unwrap(), Value::Int32(5));
        let div = Expression::binary(
            BinaryOp::Divide,
            Expression::constant(Value::Int32(2)),
            Expression::constant(Value::Int32(0)),
            false,
        );
        assert!(eval(&div).is_err());
    }

    #[test]
    fn group_by_then_count_groups() {
        let items = Value::collection(vec![Value::Int32(1), Value::Int32(2), Value::Int32(1)]);
        let src = Expression::constant(items);
        let x = Parameter::new("x", HostType::Int32);
        let key = Lambda::new(x.clone(), Expression::parameter(&x));
        let grouped = Expression::call(Method::GroupBy, vec![src, Expression::lambda(key)]);
        let g = Parameter::new("g", HostType::grouping_of(HostType::Int32, HostType::Int32));
        let count = Lambda::new(
            g.clone(),
            Expression::call(Method::LongCount, vec![Expression::parameter(&g)]),
        );
        let counts = Expression::call(Method::Select, vec![grouped, Expression::lambda(count)]);
        assert_eq!(
            eval(&counts).unwrap(),
            Value::collection(vec![Value::Int64(2), Value::Int64(1)])
        );
    }

    #[test]
    fn containers_and_slots_materialize() {
        let chain = ContainerSlot::from_pairs(vec![
            ("A".to_string(), Expression::constant(Value::Int32(1))),
            ("B".to_string(), Expression::constant(Value::string("b"))),
        ])
        .unwrap();
        let read = Expression::slot(Expression::container(chain), "B", HostType::String);
        assert_eq!(eval(&read).unwrap(), Value::string("b"));
    }

    #[test]
    fn nested_dynamic_lookup_requires_model_entry() {
        let model = SchemaModel::new()
            .with_record(RecordSchema::new("NS.Known", &[("Name", HostType::String)]).open("Bag"))
            .into_resolver();
        let handle = Expression::captured("model", Value::Model(ModelHandle(model)), HostType::Model);
        let known = Value::record(Record::new("NS.Known").with("Name", Value::string("n")));
        let unknown = Value::record(Record::new("NS.Unknown"));
        let has = |instance: Value| {
            Expression::call(
                Method::HasDeclaredProperty,
                vec![handle.clone(), Expression::constant(instance), Expression::constant(Value::string("Name"))],
            )
        };
        assert_eq!(eval(&has(known)).unwrap(), Value::Bool(true));
        assert!(matches!(eval(&has(unknown)), Err(BinderError::ResourceTypeNotInModel(t)) if t == "NS.Unknown"));
    }

    #[test]
    fn substring_clamps_oversized_lengths() {
        let substring = |args: Vec<Value>| {
            eval(&Expression::call(Method::Substring, args.into_iter().map(Expression::constant).collect()))
        };
        assert_eq!(substring(vec![Value::string("hello"), Value::Int32(1), Value::Int64(i64::MAX)]), Ok(Value::string("ello")));
        assert_eq!(substring(vec![Value::string("hello"), Value::Int32(9)]), Ok(Value::string("")));
        assert!(substring(vec![Value::string("hello"), Value::Int32(1), Value::Int32(-1)]).is_err());
    }

    #[test]
    fn conversions_between_host_types() {
        assert_eq!(convert_value(Value::Int32(3), &HostType::Int64).unwrap(), Value::Int64(3));
        assert_eq!(convert_value(Value::Char('x'), &HostType::String).unwrap(), Value::string("x"));
        assert_eq!(convert_value(Value::Null, &HostType::Int32.to_nullable()).unwrap(), Value::Null);
        assert!(convert_value(Value::Null, &HostType::Int32).is_err());
        assert!(convert_value(Value::string("x"), &HostType::Int32).is_err());
        assert_eq!(
            convert_value(Value::TimeSpan(TimeDelta::seconds(90)), &HostType::TimeOfDay).unwrap(),
            Value::TimeOfDay(NaiveTime::from_hms_opt(0, 1, 30).unwrap())
        );
    }
}
