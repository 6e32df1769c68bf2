use micosi_concepts::{Generator, SimParams};
use micosi_core::backend::{CpuBackend, SimulatorConfig};
use micosi_core::cell::CellWithRng;
use micosi_core::interfaces::{create_cell, CellInitializer, PoleUpdater};
use micosi_core::simulator::Simulator;
use micosi_core::SimulationError;

use crate::initializers::RandomCellInitializer;
use crate::pole_updaters::StaticPoleUpdater;

/// Builds initialized simulators on the [CpuBackend].
///
/// Missing initializers default to [RandomCellInitializer] and missing pole updaters to
/// [StaticPoleUpdater], both configured from the given parameters.
pub struct SimulatorFactory;

impl SimulatorFactory {
    fn build(
        params: SimParams,
        cells: Vec<CellWithRng>,
        start_time: f64,
        updater: Box<dyn PoleUpdater>,
        config: SimulatorConfig,
    ) -> Result<Simulator, SimulationError> {
        let mut simulator = Simulator::new(params, CpuBackend::new(config, updater));
        simulator.init(cells, start_time)?;
        Ok(simulator)
    }

    /// Creates one new cell per generator state and starts the clock at zero.
    pub fn from_states(
        params: SimParams,
        states: Vec<Generator>,
        initializer: Option<&dyn CellInitializer>,
        updater: Option<Box<dyn PoleUpdater>>,
        config: SimulatorConfig,
    ) -> Result<Simulator, SimulationError> {
        let random;
        let initializer: &dyn CellInitializer = match initializer {
            Some(initializer) => initializer,
            None => {
                random = RandomCellInitializer::new(&params);
                &random
            }
        };
        let updater = updater.unwrap_or_else(|| Box::new(StaticPoleUpdater::new(&params)));
        let cells = states
            .into_iter()
            .map(|mut rng| {
                let cell = create_cell(initializer, updater.as_ref(), &mut rng)?;
                Ok(CellWithRng::new(cell, rng))
            })
            .collect::<Result<Vec<_>, SimulationError>>()?;
        Self::build(params, cells, 0.0, updater, config)
    }

    /// Continues the given cells from `start_time`.
    pub fn from_cells(
        params: SimParams,
        cells: Vec<CellWithRng>,
        start_time: f64,
        updater: Option<Box<dyn PoleUpdater>>,
        config: SimulatorConfig,
    ) -> Result<Simulator, SimulationError> {
        let updater = updater.unwrap_or_else(|| Box::new(StaticPoleUpdater::new(&params)));
        Self::build(params, cells, start_time, updater, config)
    }
}
