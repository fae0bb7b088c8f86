use crate::{
    error::Result,
    expr::{aggregates::{Accumulator, AggregateImpl}, Value},
    model::HostType,
};

/// Element count; nulls are elements too.
pub struct CountImpl;

impl AggregateImpl for CountImpl {
    fn name(&self) -> &'static str { "count" }

    fn result_type(&self, _input: &HostType) -> Option<HostType> {
        Some(HostType::Int64)
    }

    fn create_accumulator(&self, _result: &HostType) -> Box<dyn Accumulator> {
        Box::new(CountAcc { seen: 0 })
    }
}

struct CountAcc {
    seen: i64,
}

impl Accumulator for CountAcc {
    fn update(&mut self, _value: &Value) -> Result<()> {
        self.seen += 1;
        Ok(())
    }

    fn finalize(&self) -> Result<Value> {
        Ok(Value::Int64(self.seen))
    }
}
