//! Implementations of [CellInitializer](micosi_core::interfaces::CellInitializer).
//!
//! | Initializer | Use |
//! | --- | --- |
//! | [RandomCellInitializer] | New simulations |
//! | [DeserializingCellInitializer] | Cells read back from a stored time layer |

mod deserializing;
mod random;

pub use deserializing::*;
pub use random::*;
