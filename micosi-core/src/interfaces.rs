//! Seams through which external collaborators plug into the engine.

use micosi_concepts::{Generator, SetupError, Vec3};

use crate::cell::{Cell, PoleType};
use crate::errors::SimulationError;
use crate::stats::CellStats;

/// Supplies the initial state of new cells.
pub trait CellInitializer {
    /// Number of chromosome pairs and MTs per pole of the created cells.
    fn cell_config(&self) -> (usize, usize);

    /// Fills a freshly constructed cell with its initial geometry.
    fn initialize_cell(&self, cell: &mut Cell, rng: &mut Generator) -> Result<(), SetupError>;
}

/// Supplies the positions of the poles over time.
pub trait PoleUpdater: Send + Sync {
    /// Places the poles of a new cell.
    fn set_initial(&self, left: &mut Vec3, right: &mut Vec3, rng: &mut Generator);

    /// Moves the poles to their position at `time`.
    fn move_poles(&self, left: &mut Vec3, right: &mut Vec3, time: f64, rng: &mut Generator);
}

/// Exposes summaries of the simulated cells.
pub trait CellStatsProvider {
    /// One entry per cell.
    fn stats(&mut self) -> Result<&[CellStats], SimulationError>;
}

/// Constructs a cell of the shape given by `initializer`, initializes it and places its poles.
pub fn create_cell(
    initializer: &dyn CellInitializer,
    updater: &dyn PoleUpdater,
    rng: &mut Generator,
) -> Result<Cell, SetupError> {
    let (chr_pairs, mts_per_pole) = initializer.cell_config();
    let mut cell = Cell::new(chr_pairs, mts_per_pole);
    initializer.initialize_cell(&mut cell, rng)?;
    let (mut left, mut right) = cell.pole_positions();
    updater.set_initial(&mut left, &mut right, rng);
    cell.pole_mut(PoleType::Left).set_position(left);
    cell.pole_mut(PoleType::Right).set_position(right);
    Ok(cell)
}
