pub mod error;
pub use error::{BinderError, Result};

pub mod model;
pub use model::{EdmTypeRef, HostType, ModelResolver, SchemaModel};

pub mod ast;

pub mod expr;
pub use expr::{Expression, Interpreter, Lambda, Value};

pub mod container;

pub mod binder;
pub use binder::{bind_compute, bind_filter, bind_group_by_and_aggregate, bind_order_by, BinderContext, BinderSettings};
