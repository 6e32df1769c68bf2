//! Simulations which store their cells while they run.
//!
//! | Mode | Entry point |
//! | --- | --- |
//! | new | [Simulation::new] |
//! | restart | [Simulation::restart] |
//! | continue | [Simulation::resume] |
//! | fix | [fix] |
//!
//! Every cell of an ensemble gets its own file.
//! For more than one cell the index of the cell is inserted in front of the extension of
//! the given file name, see [cell_file_names].

use std::path::{Path, PathBuf};

use micosi_building_blocks::factory::SimulatorFactory;
use micosi_concepts::{Access, DoubleParam, Generator, RandomEngine, SetupError, SimParams};
use micosi_core::backend::SimulatorConfig;
use micosi_core::cell::CellWithRng;
use micosi_core::interfaces::{CellInitializer, CellStatsProvider, PoleUpdater};
use micosi_core::simulator::Simulator;
use micosi_core::stats::CellStats;
use micosi_core::storage::TimeStream;
use micosi_core::{SimulationError, StorageError};

/// A layer is stored once the clock passed the last stored time by `save_freq_macro` minus
/// this tolerance.
pub const SAVE_TOLERANCE: f64 = 1e-5;

/// File names of the cells of an ensemble.
///
/// ```
/// # use micosi::launch::cell_file_names;
/// # use std::path::PathBuf;
/// assert_eq!(cell_file_names("out/a.cell", 1), vec![PathBuf::from("out/a.cell")]);
/// assert_eq!(
///     cell_file_names("out/a.cell", 2),
///     vec![PathBuf::from("out/a_0.cell"), PathBuf::from("out/a_1.cell")]
/// );
/// ```
pub fn cell_file_names(template: impl AsRef<Path>, cells: usize) -> Vec<PathBuf> {
    let template = template.as_ref();
    if cells <= 1 {
        return vec![template.to_owned()];
    }
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (0..cells)
        .map(|i| {
            let name = match template.extension() {
                Some(ext) => format!("{stem}_{i}.{}", ext.to_string_lossy()),
                None => format!("{stem}_{i}"),
            };
            template.with_file_name(name)
        })
        .collect()
}

/// Repairs the file of one cell.
/// Returns the number of remaining layers and the time of the last one.
pub fn fix(cell_file: impl AsRef<Path>) -> Result<(usize, Option<f64>), StorageError> {
    let mut stream = TimeStream::repair(cell_file)?;
    let layers = stream.layer_count();
    let last = match layers {
        0 => None,
        n => Some(stream.layer_time(n - 1)?),
    };
    #[cfg(feature = "tracing")]
    tracing::info!(path = %stream.path().display(), layers, "repaired cell file");
    Ok((layers, last))
}

/// Collaborators of a [Simulation] besides its parameters.
#[derive(Default)]
pub struct Setup<'a> {
    /// Creates new cells. [RandomCellInitializer](micosi_building_blocks::initializers::RandomCellInitializer) if empty.
    pub initializer: Option<&'a dyn CellInitializer>,
    /// Moves the poles. [StaticPoleUpdater](micosi_building_blocks::pole_updaters::StaticPoleUpdater) if empty.
    pub updater: Option<Box<dyn PoleUpdater>>,
    /// Backend resources
    pub config: SimulatorConfig,
}

/// A [Simulator] which appends the state of its cells to their files every
/// `save_freq_macro` of model time.
#[derive(Debug)]
pub struct Simulation {
    simulator: Simulator,
    streams: Vec<TimeStream>,
    save_freq: f64,
    last_saved: f64,
}

fn save_states(streams: &mut [TimeStream], simulator: &Simulator) -> Result<(), SimulationError> {
    let cells = simulator.cells();
    if cells.len() != streams.len() {
        return Err(SimulationError::StateError(format!(
            "{} cells cannot be stored in {} files",
            cells.len(),
            streams.len()
        )));
    }
    for (stream, c) in streams.iter_mut().zip(cells) {
        stream.append_layer(&c.cell, simulator.time(), &c.rng)?;
    }
    Ok(())
}

impl Simulation {
    /// Starts a new simulation of `cells` cells.
    ///
    /// The generator states of the cells are derived from `seed`, or from the clock if no
    /// seed is given.
    /// Existing files are replaced.
    pub fn new(
        cell_file: impl AsRef<Path>,
        cells: usize,
        seed: Option<u32>,
        params: SimParams,
        setup: Setup,
    ) -> Result<Self, SimulationError> {
        if cells == 0 {
            return Err(SetupError("at least one cell has to be simulated".into()).into());
        }
        let mut rng = match seed {
            Some(seed) => Generator::from_seed_u32(seed),
            None => Generator::from_time(),
        };
        let states = match cells {
            1 => vec![rng],
            n => rng.multiply(n)?,
        };
        let seed = seed.map(i64::from).unwrap_or(-1);
        Self::start(&cell_file_names(cell_file, cells), states, seed, params, setup)
    }

    fn start(
        files: &[PathBuf],
        states: Vec<Generator>,
        seed: i64,
        params: SimParams,
        setup: Setup,
    ) -> Result<Self, SimulationError> {
        let save_freq = params.get_double(DoubleParam::SaveFreqMacro);
        let initial_states = states.clone();
        let simulator = SimulatorFactory::from_states(
            params,
            states,
            setup.initializer,
            setup.updater,
            setup.config,
        )?;
        let mut streams = Vec::with_capacity(files.len());
        for ((file, c), rng) in files.iter().zip(simulator.cells()).zip(&initial_states) {
            let mut stream = TimeStream::create(file, &c.cell, rng, seed)?;
            stream.append_params(simulator.params())?;
            streams.push(stream);
        }
        save_states(&mut streams, &simulator)?;
        #[cfg(feature = "tracing")]
        tracing::info!(cells = streams.len(), seed, "started new simulation");
        Ok(Self {
            last_saved: simulator.time(),
            simulator,
            streams,
            save_freq,
        })
    }

    /// Runs a stored simulation again from its initial generator states.
    ///
    /// The files are overwritten. With the same parameters the new files are identical to
    /// the old ones.
    pub fn restart(
        cell_file: impl AsRef<Path>,
        cells: usize,
        params: SimParams,
        setup: Setup,
    ) -> Result<Self, SimulationError> {
        let files = cell_file_names(cell_file, cells);
        let mut states = Vec::with_capacity(files.len());
        let mut seed = -1;
        for file in &files {
            let stream = TimeStream::open(file)?;
            seed = stream.configuration().seed;
            states.push(stream.configuration().rng.clone());
        }
        if states.is_empty() {
            return Err(SetupError("at least one cell has to be simulated".into()).into());
        }
        Self::start(&files, states, seed, params, setup)
    }

    /// Continues a stored simulation from its last layer.
    ///
    /// The stored parameters can be changed by `props` in [Access::Update] mode, for example
    /// to extend `t_end`. Constant parameters cannot be changed.
    /// All cells have to share their parameters and the time of their last layer.
    pub fn resume(
        cell_file: impl AsRef<Path>,
        cells: usize,
        props: Option<&str>,
        setup: Setup,
    ) -> Result<Self, SimulationError> {
        if setup.initializer.is_some() {
            return Err(SetupError(
                "cannot continue an existing simulation with new initial conditions".into(),
            )
            .into());
        }
        let files = cell_file_names(cell_file, cells);
        let mut streams = Vec::with_capacity(files.len());
        let mut ensemble = Vec::with_capacity(files.len());
        let mut shared: Option<(SimParams, SimParams, f64)> = None;
        for file in &files {
            let mut stream = TimeStream::open(file)?;
            let layers = stream.layer_count();
            if layers == 0 {
                return Err(SetupError(format!(
                    "cannot continue empty simulation {}, start a new one",
                    file.display()
                ))
                .into());
            }
            stream.move_to(layers - 1)?;
            let layer = stream.current().ok_or_else(|| {
                SimulationError::StateError("last layer could not be loaded".to_owned())
            })?;

            let mut params = SimParams::new();
            params.set_access(Access::Initialize);
            params.import_values(&layer.params.export_values())?;
            params.set_access(Access::Update);
            if let Some(props) = props {
                params.import_props(props)?;
            }

            match &shared {
                None => shared = Some((layer.params.clone(), params, layer.time)),
                Some((_, first, time)) => {
                    if first.export_values() != params.export_values() {
                        return Err(SetupError(
                            "cannot process cells with different parameters simultaneously".into(),
                        )
                        .into());
                    }
                    if *time != layer.time {
                        return Err(SetupError(
                            "cannot process cells with different times simultaneously".into(),
                        )
                        .into());
                    }
                }
            }
            ensemble.push(CellWithRng::new(layer.cell.clone(), layer.rng.clone()));
            streams.push(stream);
        }
        let (stored, params, time) = shared
            .ok_or_else(|| SetupError("at least one cell has to be simulated".into()))?;
        if stored.export_values() != params.export_values() {
            for stream in streams.iter_mut() {
                stream.append_params(&params)?;
            }
        }
        let save_freq = params.get_double(DoubleParam::SaveFreqMacro);
        let simulator =
            SimulatorFactory::from_cells(params, ensemble, time, setup.updater, setup.config)?;
        #[cfg(feature = "tracing")]
        tracing::info!(cells = streams.len(), time, "continuing simulation");
        Ok(Self {
            simulator,
            streams,
            save_freq,
            last_saved: time,
        })
    }

    /// Model time.
    pub fn time(&self) -> f64 {
        self.simulator.time()
    }

    /// Whether the end time was reached.
    pub fn is_finished(&self) -> bool {
        self.simulator.is_finished()
    }

    /// The running simulator.
    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Current cells and their generators.
    pub fn cells(&self) -> &[CellWithRng] {
        self.simulator.cells()
    }

    /// Appends the current state of all cells to their files.
    pub fn save_states(&mut self) -> Result<(), SimulationError> {
        save_states(&mut self.streams, &self.simulator)?;
        self.last_saved = self.simulator.time();
        Ok(())
    }

    /// Performs one iteration and stores the cells when a save point was passed.
    pub fn do_iteration(&mut self) -> Result<(), SimulationError> {
        self.simulator.do_iteration()?;
        if self.last_saved + self.save_freq <= self.simulator.time() + SAVE_TOLERANCE {
            self.save_states()?;
        }
        Ok(())
    }

    /// Iterates until the end time and stores the cells on the way.
    pub fn run_to_end(&mut self, show_progress: bool) -> Result<(), SimulationError> {
        let Self {
            simulator,
            streams,
            save_freq,
            last_saved,
        } = self;
        simulator.run_to_end(show_progress, |simulator| {
            if *last_saved + *save_freq <= simulator.time() + SAVE_TOLERANCE {
                save_states(streams, simulator)?;
                *last_saved = simulator.time();
            }
            Ok(())
        })
    }

    /// Writes all files and returns the cells.
    pub fn finish(mut self) -> Result<Vec<CellWithRng>, SimulationError> {
        for stream in self.streams.iter_mut() {
            stream.flush()?;
        }
        let Self { simulator, .. } = self;
        Ok(simulator.into_cells())
    }
}

impl CellStatsProvider for Simulation {
    fn stats(&mut self) -> Result<&[CellStats], SimulationError> {
        self.simulator.stats()
    }
}
