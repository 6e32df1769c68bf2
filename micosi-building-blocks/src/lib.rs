#![warn(missing_docs)]
//! # MiCoSi - Building Blocks
//!
//! Ready-made implementations of the interfaces through which cells enter a simulation.
//! [initializers] create the initial state of a cell, [pole_updaters] move the spindle
//! poles over time and the [SimulatorFactory](factory::SimulatorFactory) combines them into
//! a running [Simulator](micosi_core::simulator::Simulator).
//!
//! ```
//! # use micosi_building_blocks::prelude::*;
//! # use micosi_concepts::{Generator, RandomEngine, SimParams};
//! let params = SimParams::new();
//! let states = Generator::from_seed_u32(1).multiply(2).unwrap();
//! let simulator =
//!     SimulatorFactory::from_states(params, states, None, None, Default::default()).unwrap();
//! assert_eq!(simulator.cells().len(), 2);
//! ```

/// Construction of simulators from generator states or stored cells
pub mod factory;
pub mod initializers;
pub mod pole_updaters;
pub mod prelude;
