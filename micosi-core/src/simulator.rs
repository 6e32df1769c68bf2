//! The [Simulator] owns an ensemble of cells and the simulation clock.
//!
//! It moves through the states [SimulatorState::Uninitialized], [SimulatorState::Running] and
//! [SimulatorState::Finished].
//! Each call to [Simulator::do_iteration] runs the pole, macro, micro and spring phases of its
//! [SimulatorBackend] in this order and advances the clock by `dt`.

use kdam::BarExt;
use micosi_concepts::{DoubleParam, SimParams};

use crate::backend::{CpuBackend, SimulatorBackend, StepConstants};
use crate::cell::CellWithRng;
use crate::errors::SimulationError;
use crate::interfaces::CellStatsProvider;
use crate::stats::CellStats;

/// Tolerance of the comparison between the clock and the end time.
pub const TIME_TOLERANCE: f64 = 1e-6;

/// Lifecycle of a [Simulator].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulatorState {
    /// No cells were given yet.
    Uninitialized,
    /// Iterations can be performed.
    Running,
    /// The clock reached the end time.
    Finished,
}

/// Advances an ensemble of cells over time.
#[derive(Debug)]
pub struct Simulator<B = CpuBackend> {
    backend: B,
    params: SimParams,
    constants: StepConstants,
    time: f64,
    initialized: bool,
    stats: Option<Vec<CellStats>>,
}

impl<B: SimulatorBackend> Simulator<B> {
    /// Creates an uninitialized simulator.
    pub fn new(params: SimParams, backend: B) -> Self {
        let constants = StepConstants::new(&params);
        Self {
            backend,
            params,
            constants,
            time: 0.0,
            initialized: false,
            stats: None,
        }
    }

    /// Binds the ensemble and sets the clock to `start_time`.
    pub fn init(&mut self, cells: Vec<CellWithRng>, start_time: f64) -> Result<(), SimulationError> {
        if self.initialized {
            return Err(SimulationError::StateError(
                "simulator is already initialized".to_owned(),
            ));
        }
        if cells.is_empty() {
            return Err(SimulationError::SetupError(
                "cannot initialize solver without cells".into(),
            ));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(cells = cells.len(), start_time, "initializing simulator");
        self.backend.import_cells(cells)?;
        self.time = start_time;
        self.initialized = true;
        self.stats = None;
        Ok(())
    }

    /// Current state of the lifecycle.
    pub fn state(&self) -> SimulatorState {
        if !self.initialized {
            SimulatorState::Uninitialized
        } else if self.is_finished() {
            SimulatorState::Finished
        } else {
            SimulatorState::Running
        }
    }

    /// Whether the clock reached the end time.
    pub fn is_finished(&self) -> bool {
        let end = self.params.get_double(DoubleParam::TEnd);
        self.time >= end || (self.time - end).abs() < TIME_TOLERANCE
    }

    /// Performs one iteration of all phases.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn do_iteration(&mut self) -> Result<(), SimulationError> {
        match self.state() {
            SimulatorState::Uninitialized => {
                return Err(SimulationError::StateError(
                    "simulator has to be initialized before an iteration".to_owned(),
                ))
            }
            SimulatorState::Finished => {
                return Err(SimulationError::StateError(
                    "simulation is finished and new iteration cannot be done".to_owned(),
                ))
            }
            SimulatorState::Running => (),
        }
        let c = &self.constants;
        self.backend.pole_step(c, self.time);
        self.backend.macro_step(c);
        self.backend.micro_step(c);
        let _broken = self.backend.spring_step(c);
        #[cfg(feature = "tracing")]
        if _broken > 0 {
            tracing::info!(cells = _broken, time = self.time, "springs broke");
        }
        self.time += c.dt_user;
        self.stats = None;
        Ok(())
    }

    /// Iterates until the end time is reached.
    ///
    /// `on_iteration` is called after every iteration, for example to store time layers.
    /// With `show_progress` a progress bar is drawn on the terminal.
    pub fn run_to_end<F>(&mut self, show_progress: bool, mut on_iteration: F) -> Result<(), SimulationError>
    where
        F: FnMut(&Self) -> Result<(), SimulationError>,
    {
        let mut bar = if show_progress {
            Some(self.build_progress_bar()?)
        } else {
            None
        };
        while !self.is_finished() {
            self.do_iteration()?;
            on_iteration(self)?;
            if let Some(bar) = bar.as_mut() {
                bar.update(1)?;
            }
        }
        Ok(())
    }

    fn build_progress_bar(&self) -> Result<kdam::Bar, SimulationError> {
        let bar_format = "\
        {desc}{percentage:3.0}%|{animation}| \
        {count}/{total} \
        [{elapsed}, \
        {rate:.2}{unit}/s{postfix}]";
        kdam::BarBuilder::default()
            .total(self.remaining_iterations())
            .bar_format(bar_format)
            .dynamic_ncols(true)
            .build()
            .map_err(SimulationError::ProgressError)
    }

    /// Number of iterations until the end time.
    pub fn remaining_iterations(&self) -> usize {
        let end = self.params.get_double(DoubleParam::TEnd);
        let dt = self.constants.dt_user;
        let remaining = (end - self.time) / dt;
        if remaining <= TIME_TOLERANCE {
            0
        } else {
            (remaining - TIME_TOLERANCE / dt).ceil() as usize
        }
    }

    /// Model time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Parameters in use.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Derived parameters handed to the backend.
    pub fn constants(&self) -> &StepConstants {
        &self.constants
    }

    /// Replaces the parameters, for example after loading a new parameter record.
    pub fn set_params(&mut self, params: SimParams) {
        self.constants = StepConstants::new(&params);
        self.params = params;
        self.stats = None;
    }

    /// Current cells and their generators.
    pub fn cells(&self) -> &[CellWithRng] {
        self.backend.cells()
    }

    /// The backend executing the phases.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Releases the ensemble.
    pub fn into_cells(mut self) -> Vec<CellWithRng> {
        self.backend.take_cells()
    }
}

impl<B: SimulatorBackend> CellStatsProvider for Simulator<B> {
    fn stats(&mut self) -> Result<&[CellStats], SimulationError> {
        let cell_count = self.backend.cells().len();
        if self.stats.is_none() {
            #[cfg(feature = "tracing")]
            tracing::debug!(time = self.time, "recomputing cell statistics");
            let stats = self
                .backend
                .cells()
                .iter()
                .map(|c| CellStats::from_cell(&c.cell))
                .collect::<Result<Vec<_>, _>>()?;
            self.stats = Some(stats);
        }
        match self.stats.as_deref() {
            Some(stats) if stats.len() == cell_count => Ok(stats),
            _ => Err(SimulationError::StateError(
                "statistics do not match the number of cells".to_owned(),
            )),
        }
    }
}
