use micosi_concepts::{default_direct, Generator, Mat3, SetupError, Vec3};
use micosi_core::cell::{Cell, MtState};
use micosi_core::interfaces::CellInitializer;
use micosi_core::storage::CellConfiguration;

/// Creates blank cells of a fixed shape which are then overwritten by a stored time layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeserializingCellInitializer {
    chr_pairs: usize,
    mts_per_pole: usize,
}

impl DeserializingCellInitializer {
    /// Initializer for cells with `chr_pairs` chromosome pairs and `mts_per_pole` MTs on
    /// each pole.
    pub fn new(chr_pairs: usize, mts_per_pole: usize) -> Self {
        Self {
            chr_pairs,
            mts_per_pole,
        }
    }
}

impl From<&CellConfiguration> for DeserializingCellInitializer {
    fn from(configuration: &CellConfiguration) -> Self {
        Self::new(configuration.chr_pairs, configuration.mts_per_pole)
    }
}

impl CellInitializer for DeserializingCellInitializer {
    fn cell_config(&self) -> (usize, usize) {
        (self.chr_pairs, self.mts_per_pole)
    }

    fn initialize_cell(&self, cell: &mut Cell, _rng: &mut Generator) -> Result<(), SetupError> {
        if cell.config() != self.cell_config() {
            return Err(SetupError(format!(
                "cell with shape {:?} cannot be initialized as {:?}",
                cell.config(),
                self.cell_config()
            )));
        }
        cell.set_pole_positions(Vec3::zeros(), Vec3::zeros());
        for id in 0..cell.mt_count() {
            if let Some(mut mt) = cell.mt_mut(id) {
                mt.set_direction(&default_direct());
                mt.set_length(0.0);
                mt.set_state(MtState::Polymerization);
                mt.set_bound_chromosome(None);
            }
        }
        for id in 0..cell.chromosome_count() {
            if let Some(mut chromosome) = cell.chromosome_mut(id) {
                chromosome.set_position(&Vec3::zeros());
                chromosome.set_orientation(&Mat3::identity());
            }
        }
        Ok(())
    }
}
