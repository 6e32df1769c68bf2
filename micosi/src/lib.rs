#![deny(missing_docs)]
//! MiCoSi simulates the mitotic spindle of individual cells.
//!
//! Each cell holds two poles with their microtubules (MTs) and a number of chromosome pairs.
//! MTs grow and shrink stochastically, capture chromosomes at their kinetochores and pull
//! on them until the springs between the sister chromosomes break.
//!
//! A [Simulation](launch::Simulation) couples a
//! [Simulator](micosi_core::simulator::Simulator) with one
//! [TimeStream](micosi_core::storage::TimeStream) per cell.
//! It can start new simulations, restart them from the stored seeds, continue them from
//! their last stored layer and repair files which were not closed properly.

pub use micosi_building_blocks as building_blocks;

pub use micosi_concepts as concepts;

pub use micosi_core as core;

pub mod launch;

/// Re-exports the default simulation types and traits.
pub mod prelude;
