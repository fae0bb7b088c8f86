pub mod container_slot;
pub use container_slot::*;

pub mod wrapper;
pub use wrapper::*;
