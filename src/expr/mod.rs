pub mod aggregates;

pub mod value;
pub use value::*;

pub mod truth;
pub use truth::*;

pub mod parameter;
pub use parameter::*;

pub mod method;
pub use method::*;

pub mod expression;
pub use expression::*;

mod display;

pub mod interpreter;
pub use interpreter::*;
