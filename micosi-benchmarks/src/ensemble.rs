use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use kdam::BarExt;
use micosi::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct EnsembleSettings {
    cells: usize,
    threads: usize,
    chr_pairs: i32,
    mts_per_pole: i32,
    /// Model time in seconds
    t_end: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct BenchmarkResult {
    settings: EnsembleSettings,
    /// Wall time of every sample in nanoseconds
    times: Vec<u128>,
}

#[derive(Parser, Debug)]
#[command(about = "Measures how ensembles of cells scale")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,

    /// Number of measurements for every setting
    #[arg(short, long, default_value_t = 5)]
    sample_size: usize,

    /// Directory of the stored results
    #[arg(short, long, default_value = "benchmark_results")]
    output: PathBuf,

    /// Disable the progress bar
    #[arg(long)]
    no_output: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fixed ensemble of 64 cells with a varying number of threads
    Threads {
        #[arg(required = true)]
        threads: Vec<usize>,
    },
    /// Varying size of the ensemble with all available threads
    Cells {
        #[arg(required = true)]
        cells: Vec<usize>,
    },
}

fn run_ensemble(settings: &EnsembleSettings) -> Result<(), SimulationError> {
    let mut params = SimParams::new();
    params.set_access(Access::Initialize);
    params.set_int(IntParam::NCrTotal, settings.chr_pairs)?;
    params.set_int(IntParam::NMtTotal, settings.mts_per_pole)?;
    params.set_double(DoubleParam::TEnd, settings.t_end)?;
    params.set_access(Access::Update);

    let mut rng = Generator::from_seed_u32(1);
    let states = rng.multiply(settings.cells)?;
    let config = SimulatorConfig {
        threads: settings.threads,
    };
    let mut simulator = SimulatorFactory::from_states(params, states, None, None, config)?;
    simulator.run_to_end(false, |_| Ok(()))
}

impl CliArgs {
    fn storage_path(&self, prefix: &str) -> PathBuf {
        self.output.join(prefix)
    }

    fn progress_bar(&self, total: usize) -> Option<kdam::Bar> {
        match self.no_output {
            true => None,
            false => Some(kdam::tqdm!(total = total, position = 0)),
        }
    }
}

impl BenchmarkResult {
    fn file_name(settings: &EnsembleSettings) -> String {
        format!(
            "cells{}-threads{}-pairs{}-mts{}.json",
            settings.cells, settings.threads, settings.chr_pairs, settings.mts_per_pole
        )
    }

    fn store_to_file(&self, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(dir)?;
        let file = std::fs::File::create(dir.join(Self::file_name(&self.settings)))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    fn try_read_from_file(
        dir: &Path,
        settings: &EnsembleSettings,
    ) -> Result<Option<Self>, Box<dyn std::error::Error>> {
        let path = dir.join(Self::file_name(settings));
        if !path.exists() {
            return Ok(None);
        }
        let result: Self = serde_json::from_reader(std::fs::File::open(path)?)?;
        match result.settings == *settings {
            true => Ok(Some(result)),
            false => Ok(None),
        }
    }
}

fn measure(
    args: &CliArgs,
    settings: Vec<EnsembleSettings>,
    prefix: &str,
) -> Result<Vec<BenchmarkResult>, Box<dyn std::error::Error>> {
    let dir = args.storage_path(prefix);
    let mut bar = args.progress_bar(settings.len() * args.sample_size);
    let mut results = Vec::with_capacity(settings.len());
    for setting in settings {
        if let Some(result) = BenchmarkResult::try_read_from_file(&dir, &setting)? {
            if let Some(bar) = bar.as_mut() {
                bar.update(args.sample_size)?;
            }
            results.push(result);
            continue;
        }

        // Warm-up
        run_ensemble(&setting)?;
        let mut times = Vec::with_capacity(args.sample_size);
        for sample in 0..args.sample_size {
            let now = std::time::Instant::now();
            std::hint::black_box(run_ensemble(&setting))?;
            times.push(now.elapsed().as_nanos());
            if let Some(bar) = bar.as_mut() {
                bar.set_description(format!(
                    "cells: {} threads: {} sample: {}",
                    setting.cells,
                    setting.threads,
                    sample + 1
                ));
                bar.update(1)?;
            }
        }
        let result = BenchmarkResult {
            settings: setting,
            times,
        };
        result.store_to_file(&dir)?;
        results.push(result);
    }
    Ok(results)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let base = EnsembleSettings {
        cells: 64,
        threads: 0,
        chr_pairs: 4,
        mts_per_pole: 500,
        t_end: 10.0,
    };
    let (settings, prefix): (Vec<_>, _) = match &args.command {
        Command::Threads { threads } => (
            threads
                .iter()
                .map(|&threads| EnsembleSettings {
                    threads,
                    ..base.clone()
                })
                .collect(),
            "thread-scaling",
        ),
        Command::Cells { cells } => (
            cells
                .iter()
                .map(|&cells| EnsembleSettings {
                    cells,
                    ..base.clone()
                })
                .collect(),
            "ensemble-size",
        ),
    };
    for result in measure(&args, settings, prefix)? {
        let mean = result.times.iter().sum::<u128>() as f64 / result.times.len().max(1) as f64;
        println!(
            "cells {:>4} threads {:>3}: {:.3} s",
            result.settings.cells,
            result.settings.threads,
            mean * 1e-9
        );
    }
    Ok(())
}
