pub mod edm_type;
pub use edm_type::*;

pub mod host_type;
pub use host_type::*;

pub mod model_resolver;
pub use model_resolver::*;

pub mod custom_aggregate;
pub use custom_aggregate::*;

pub mod schema_model;
pub use schema_model::*;
