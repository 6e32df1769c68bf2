use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use micosi::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Simulates chromosomes, microtubules and poles of dividing cells")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Start a new simulation and replace existing files
    New {
        #[command(flatten)]
        run: RunArgs,
        /// Seed of the generators, the clock is used if not given
        #[arg(long)]
        seed: Option<u32>,
    },
    /// Run a stored simulation again from its initial generator states
    Restart {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Continue stored simulations from their last layer
    Continue {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Cut damaged files back to their last complete layer
    Fix {
        /// Cell file, the index of the cell is inserted for ensembles
        cell_file: PathBuf,
        /// Number of cells in the ensemble
        #[arg(long, default_value_t = 1)]
        cells: usize,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Cell file, the index of the cell is inserted for ensembles
    cell_file: PathBuf,
    /// Number of cells in the ensemble
    #[arg(long, default_value_t = 1)]
    cells: usize,
    /// File with `name=value` parameter records
    #[arg(long)]
    config: Option<PathBuf>,
    /// Backend and number of threads, `cpu` or `cpu:N`
    #[arg(long, default_value = "cpu")]
    solver: String,
}

impl RunArgs {
    fn props(&self) -> Result<Option<String>, std::io::Error> {
        self.config.as_ref().map(std::fs::read_to_string).transpose()
    }

    /// Parameters of a new simulation, all records of the config file are allowed.
    fn initial_params(&self) -> Result<SimParams, SimulationError> {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        if let Some(props) = self.props()? {
            params.import_props(&props)?;
        }
        params.set_access(Access::Update);
        Ok(params)
    }

    fn setup(&self) -> Result<Setup<'static>, SimulationError> {
        Ok(Setup {
            config: self.solver.parse()?,
            ..Setup::default()
        })
    }
}

fn run(mut simulation: Simulation, show_progress: bool) -> Result<(), SimulationError> {
    simulation.run_to_end(show_progress)?;
    let time = simulation.time();
    let cells = simulation.finish()?;
    tracing::info!(cells = cells.len(), time, "simulation finished");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let show_progress = !cli.no_progress;
    match cli.mode {
        Mode::New { run: args, seed } => {
            let simulation = Simulation::new(
                &args.cell_file,
                args.cells,
                seed,
                args.initial_params()?,
                args.setup()?,
            )?;
            run(simulation, show_progress)?;
        }
        Mode::Restart { run: args } => {
            let simulation = Simulation::restart(
                &args.cell_file,
                args.cells,
                args.initial_params()?,
                args.setup()?,
            )?;
            run(simulation, show_progress)?;
        }
        Mode::Continue { run: args } => {
            let props = args.props()?;
            let simulation =
                Simulation::resume(&args.cell_file, args.cells, props.as_deref(), args.setup()?)?;
            run(simulation, show_progress)?;
        }
        Mode::Fix { cell_file, cells } => {
            for file in cell_file_names(&cell_file, cells) {
                let (layers, last) = fix(&file)?;
                match last {
                    Some(time) => println!("{}: {layers} layers up to t = {time}", file.display()),
                    None => println!("{}: no layers", file.display()),
                }
            }
        }
    }
    Ok(())
}
