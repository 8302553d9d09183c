#![no_std]

pub mod full_math;
pub mod rate_math;
pub mod stable_math;

pub use full_math::*;
pub use rate_math::*;
pub use stable_math::*;
