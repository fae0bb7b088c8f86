use crate::{
    error::{BinderError, Result},
    expr::{aggregates::{Accumulator, AggregateImpl}, Value},
    model::HostType,
};

/// Host types with a registered summation operator.
pub fn has_summation_operator(ty: &HostType) -> bool {
    matches!(
        ty.non_nullable(),
        HostType::Int32 | HostType::Int64 | HostType::Single | HostType::Double | HostType::Decimal
    )
}

pub struct SumImpl;
impl AggregateImpl for SumImpl {
    fn name(&self) -> &'static str { "sum" }
    fn result_type(&self, input: &HostType) -> Option<HostType> {
        has_summation_operator(input).then(|| input.clone())
    }
    fn create_accumulator(&self, result: &HostType) -> Box<dyn Accumulator> {
        Box::new(SumAcc { state: SumState::Empty, result: result.clone() })
    }
}

// Track the numeric kind seen first.
enum SumState {
    Empty,
    Int(i128),
    Float(f64),
}

struct SumAcc {
    state: SumState,
    result: HostType,
}

impl Accumulator for SumAcc {
    fn update(&mut self, value: &Value) -> Result<()> {
        if value.is_null() { return Ok(()); }
        let integral = value.is_integral();
        match (&mut self.state, value.as_i128(), value.as_f64()) {
            (SumState::Empty, Some(i), _) if integral => self.state = SumState::Int(i),
            (SumState::Empty, _, Some(f)) => self.state = SumState::Float(f),
            (SumState::Int(acc), Some(i), _) if integral => *acc += i,
            (SumState::Int(acc), _, Some(f)) => self.state = SumState::Float(*acc as f64 + f),
            (SumState::Float(acc), _, Some(f)) => *acc += f,
            _ => return Err(BinderError::evaluation(format!("Sum got non numeric value {value}"))),
        }
        Ok(())
    }

    fn finalize(&self) -> Result<Value> {
        match self.state {
            // An empty sum is zero, also for nullable inputs.
            SumState::Empty => Value::from_i128(0, &self.result),
            SumState::Int(i) => Value::from_i128(i, &self.result),
            SumState::Float(f) => Value::from_f64(f, &self.result),
        }
    }
}
