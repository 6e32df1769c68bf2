//! Reference implementation of the stepping pipeline.
//!
//! Cells are independent within every phase.
//! Each phase therefore maps over the cells in parallel on a [rayon::ThreadPool] and joins
//! before it returns.

mod constants;
mod macro_step;
mod micro;
mod pole;
mod solver;
mod spring;

pub use constants::*;
pub use solver::{solve_motion_system, MotionSystem};

use rayon::prelude::*;

use super::{SimulatorBackend, SimulatorConfig};
use crate::cell::CellWithRng;
use crate::errors::SimulationError;
use crate::interfaces::PoleUpdater;

/// Runs the phases on the CPU, one task per cell.
pub struct CpuBackend {
    config: SimulatorConfig,
    pool: Option<rayon::ThreadPool>,
    updater: Box<dyn PoleUpdater>,
    cells: Vec<CellWithRng>,
}

impl core::fmt::Debug for CpuBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CpuBackend")
            .field("config", &self.config)
            .field("workers", &self.workers())
            .field("cells", &self.cells.len())
            .finish()
    }
}

impl CpuBackend {
    /// Creates an empty backend which moves the poles with `updater`.
    pub fn new(config: SimulatorConfig, updater: Box<dyn PoleUpdater>) -> Self {
        Self {
            config,
            pool: None,
            updater,
            cells: Vec::new(),
        }
    }

    /// Number of threads of the pool, 0 before cells were imported.
    pub fn workers(&self) -> usize {
        self.pool
            .as_ref()
            .map(|pool| pool.current_num_threads())
            .unwrap_or(0)
    }

    fn build_thread_pool(&self, cells: usize) -> Result<rayon::ThreadPool, SimulationError> {
        let builder = rayon::ThreadPoolBuilder::new().num_threads(self.config.worker_count(cells));
        Ok(builder.build()?)
    }
}

fn for_each_cell<F>(pool: Option<&rayon::ThreadPool>, cells: &mut [CellWithRng], f: F)
where
    F: Fn(&mut CellWithRng) + Send + Sync,
{
    match pool {
        Some(pool) => pool.install(|| cells.par_iter_mut().for_each(|c| f(c))),
        None => cells.iter_mut().for_each(f),
    }
}

impl SimulatorBackend for CpuBackend {
    fn import_cells(&mut self, cells: Vec<CellWithRng>) -> Result<(), SimulationError> {
        self.pool = Some(self.build_thread_pool(cells.len())?);
        self.cells = cells;
        Ok(())
    }

    fn cells(&self) -> &[CellWithRng] {
        &self.cells
    }

    fn take_cells(&mut self) -> Vec<CellWithRng> {
        core::mem::take(&mut self.cells)
    }

    fn pole_step(&mut self, constants: &StepConstants, time: f64) {
        let updater = self.updater.as_ref();
        let dt = constants.dt_user;
        for_each_cell(self.pool.as_ref(), &mut self.cells, |c| {
            pole::pole_step(&mut c.cell, &mut c.rng, updater, time, dt)
        });
    }

    fn macro_step(&mut self, constants: &StepConstants) {
        for_each_cell(self.pool.as_ref(), &mut self.cells, |c| {
            macro_step::macro_step(&mut c.cell, &mut c.rng, constants)
        });
    }

    fn micro_step(&mut self, constants: &StepConstants) {
        for_each_cell(self.pool.as_ref(), &mut self.cells, |c| {
            micro::micro_step(&mut c.cell, &mut c.rng, constants)
        });
    }

    fn spring_step(&mut self, constants: &StepConstants) -> usize {
        let cells = &mut self.cells;
        let broke = |c: &mut CellWithRng| spring::spring_step(&mut c.cell, constants) as usize;
        match self.pool.as_ref() {
            Some(pool) => pool.install(|| cells.par_iter_mut().map(broke).sum()),
            None => cells.iter_mut().map(broke).sum(),
        }
    }
}
