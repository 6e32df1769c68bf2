pub use crate::launch::*;
pub use micosi_building_blocks::prelude::*;
pub use micosi_concepts::*;
pub use micosi_core::backend::*;
pub use micosi_core::cell::*;
pub use micosi_core::interfaces::*;
pub use micosi_core::simulator::*;
pub use micosi_core::stats::*;
pub use micosi_core::storage::{CellConfiguration, TimeLayer, TimeStream};
pub use micosi_core::*;
