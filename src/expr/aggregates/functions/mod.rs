pub mod average_impl;
pub use average_impl::*;

pub mod count_impl;
pub use count_impl::*;

pub mod minmax_impl;
pub use minmax_impl::*;

pub mod sum_impl;
pub use sum_impl::*;
