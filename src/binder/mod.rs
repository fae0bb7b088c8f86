pub mod settings;
pub use settings::*;

pub mod context;
pub use context::*;

pub mod query_binder;
pub use query_binder::*;

pub mod null_propagation;
pub use null_propagation::*;

pub mod property;
pub use property::*;

pub mod dynamic;
pub use dynamic::*;

pub mod binary;
pub use binary::*;

pub mod convert;
pub use convert::*;

pub mod functions;
pub use functions::*;

pub mod collection;
pub use collection::*;

pub mod filter_binder;
pub use filter_binder::*;

pub mod order_by_binder;
pub use order_by_binder::*;

pub mod flattening;
pub use flattening::*;

pub mod aggregation_binder;
pub use aggregation_binder::*;

pub mod compute_binder;
pub use compute_binder::*;

pub mod api;
pub use api::*;
