//! Re-exports of all building blocks.

pub use crate::factory::*;
pub use crate::initializers::*;
pub use crate::pole_updaters::*;
