use crate::{
    error::{BinderError, Result},
    expr::{aggregates::{Accumulator, AggregateImpl}, Value},
    model::HostType,
};

pub struct MinImpl;
pub struct MaxImpl;

fn is_orderable(ty: &HostType) -> bool {
    let ty = ty.non_nullable();
    ty.is_value_type() || ty.is_string() || ty.is_object()
}

impl AggregateImpl for MinImpl {
    fn name(&self) -> &'static str { "min" }
    fn result_type(&self, input: &HostType) -> Option<HostType> {
        is_orderable(input).then(|| input.clone())
    }
    fn create_accumulator(&self, result: &HostType) -> Box<dyn Accumulator> { Box::new(ExtremaAcc::new(Mode::Min, result)) }
}
impl AggregateImpl for MaxImpl {
    fn name(&self) -> &'static str { "max" }
    fn result_type(&self, input: &HostType) -> Option<HostType> {
        is_orderable(input).then(|| input.clone())
    }
    fn create_accumulator(&self, result: &HostType) -> Box<dyn Accumulator> { Box::new(ExtremaAcc::new(Mode::Max, result)) }
}

enum Mode { Min, Max }

struct ExtremaAcc {
    mode: Mode,
    current: Option<Value>,
    nullable: bool,
}

impl ExtremaAcc {
    fn new(mode: Mode, result: &HostType) -> Self {
        Self { mode, current: None, nullable: result.is_nullable() }
    }

    fn better(&self, current: &Value, candidate: &Value) -> Result<bool> {
        let ord = current
            .compare(candidate)
            .ok_or_else(|| BinderError::evaluation(format!("Min/Max cannot compare {current} and {candidate}")))?;
        Ok(match self.mode { Mode::Min => ord.is_gt(), Mode::Max => ord.is_lt() })
    }
}

impl Accumulator for ExtremaAcc {
    fn update(&mut self, value: &Value) -> Result<()> {
        if value.is_null() { return Ok(()); }
        let replace = match &self.current {
            None => true,
            Some(cur) => self.better(cur, value)?,
        };
        if replace {
            self.current = Some(value.clone());
        }
        Ok(())
    }
    fn finalize(&self) -> Result<Value> {
        match &self.current {
            Some(v) => Ok(v.clone()),
            None if self.nullable => Ok(Value::Null),
            None => Err(BinderError::evaluation("Min/Max over an empty sequence")),
        }
    }
}
