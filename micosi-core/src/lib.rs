#![warn(missing_docs)]
//! Engine of the MiCoSi mitotic spindle simulator.
//!
//! ## Cells
//! A [Cell](cell::Cell) keeps the state of two poles, their MTs and the chromosome pairs in
//! one block of flat arrays.
//! Objects like MTs or chromosomes are handles into this block.
//!
//! ## Backends
//! The [Simulator](simulator::Simulator) advances an ensemble of cells with a
//! [SimulatorBackend](backend::SimulatorBackend).
//! Currently the [cpu](backend::cpu) backend is the only one.
//!
//! ## Storage
//! The history of every cell is written to a [TimeStream](storage::TimeStream).
//! A stored simulation can be read back layer by layer or continued from its last layer.

pub mod backend;
pub mod cell;
mod errors;
pub mod interfaces;
pub mod simulator;
pub mod stats;
pub mod storage;

pub use errors::*;

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing;
