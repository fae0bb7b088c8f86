use crate::{
    error::{BinderError, Result},
    expr::{aggregates::{Accumulator, AggregateImpl}, Value},
    model::HostType,
};

/// Host types with a registered averaging operator, mapped to the average's type.
pub fn averaging_result_type(ty: &HostType) -> Option<HostType> {
    let result = match ty.non_nullable() {
        HostType::Int32 | HostType::Int64 | HostType::Double => HostType::Double,
        HostType::Single => HostType::Single,
        HostType::Decimal => HostType::Decimal,
        _ => return None,
    };
    Some(if ty.is_nullable_value_type() { result.to_nullable() } else { result })
}

pub struct AverageImpl;
impl AggregateImpl for AverageImpl {
    fn name(&self) -> &'static str { "average" }
    fn result_type(&self, input: &HostType) -> Option<HostType> {
        averaging_result_type(input)
    }
    fn create_accumulator(&self, result: &HostType) -> Box<dyn Accumulator> {
        Box::new(AverageAcc { sum: 0.0, cnt: 0, result: result.clone() })
    }
}

struct AverageAcc { sum: f64, cnt: i64, result: HostType }
impl Accumulator for AverageAcc {
    fn update(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => {}
            v => {
                let f = v.as_f64().ok_or_else(|| BinderError::evaluation(format!("Average got non numeric value {v}")))?;
                self.sum += f;
                self.cnt += 1;
            }
        }
        Ok(())
    }
    fn finalize(&self) -> Result<Value> {
        if self.cnt == 0 {
            return if self.result.is_nullable() {
                Ok(Value::Null)
            } else {
                Err(BinderError::evaluation("Average over an empty sequence"))
            };
        }
        Value::from_f64(self.sum / (self.cnt as f64), &self.result)
    }
}
