//! Backends advance every cell of an ensemble through the phases of one iteration.
//!
//! | Backend | Description |
//! | --- | --- |
//! | [cpu] | Reference implementation, parallel over cells with a [rayon] pool |
//!
//! The [Simulator](crate::simulator::Simulator) calls the phases of a [SimulatorBackend] in
//! fixed order. Every phase finishes for all cells before the next one starts.

use serde::{Deserialize, Serialize};

use crate::cell::CellWithRng;
use crate::errors::SimulationError;

pub mod cpu;

pub use cpu::{CpuBackend, SpringBrakeCriterion, StepConstants};

/// Executes the phases of one iteration for all cells of an ensemble.
pub trait SimulatorBackend {
    /// Takes ownership of the ensemble. Prepares workers for its size.
    fn import_cells(&mut self, cells: Vec<CellWithRng>) -> Result<(), SimulationError>;

    /// Current state of the ensemble.
    fn cells(&self) -> &[CellWithRng];

    /// Returns the ensemble and leaves the backend empty.
    fn take_cells(&mut self) -> Vec<CellWithRng>;

    /// Moves the poles of every cell to their position at `time + dt`.
    fn pole_step(&mut self, constants: &StepConstants, time: f64);

    /// Force balance and motion of the chromosomes.
    fn macro_step(&mut self, constants: &StepConstants);

    /// Dynamic instability and capture of the MTs.
    fn micro_step(&mut self, constants: &StepConstants);

    /// Evaluates the spring breaking criterion.
    /// Returns how many cells broke their springs in this call.
    fn spring_step(&mut self, constants: &StepConstants) -> usize;
}

/// Selects the backend and its resources.
///
/// ```
/// # use micosi_core::backend::SimulatorConfig;
/// let config: SimulatorConfig = "cpu:4".parse().unwrap();
/// assert_eq!(config.threads, 4);
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct SimulatorConfig {
    /// Number of worker threads. `0` uses all available processors.
    pub threads: usize,
}

impl SimulatorConfig {
    /// Number of workers for an ensemble of `cells`.
    ///
    /// Never exceeds the number of cells and is at least one.
    pub fn worker_count(&self, cells: usize) -> usize {
        let threads = match self.threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };
        threads.min(cells).max(1)
    }
}

impl core::str::FromStr for SimulatorConfig {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wrong = || {
            SimulationError::SetupError(
                format!("unknown solver \"{s}\", expected \"cpu\" or \"cpu:N\"").into(),
            )
        };
        let s = s.trim().to_lowercase();
        match s.split_once(':') {
            None if s == "cpu" => Ok(Self { threads: 0 }),
            Some(("cpu", threads)) => {
                let threads = threads.trim().parse().map_err(|_| wrong())?;
                Ok(Self { threads })
            }
            _ => Err(wrong()),
        }
    }
}
