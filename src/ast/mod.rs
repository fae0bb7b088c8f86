pub mod literal;
pub use literal::*;

pub mod operators;
pub use operators::*;

pub mod query_node;
pub use query_node::*;

pub mod clauses;
pub use clauses::*;

pub mod transformation;
pub use transformation::*;
