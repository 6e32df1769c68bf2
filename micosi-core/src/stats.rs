//! Aggregated summaries of cells used for progress reports.

use micosi_concepts::CalcError;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellOps, MtState};
use crate::errors::SimulationError;

/// MT counts by binding and dynamic instability state.
///
/// Counts are averages when the stats were aggregated over multiple cells.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct MtStats {
    bound: f64,
    free: f64,
    polymerizing: f64,
    depolymerizing: f64,
}

impl MtStats {
    /// Checks that both partitions describe the same number of MTs.
    pub fn new(
        bound: f64,
        free: f64,
        polymerizing: f64,
        depolymerizing: f64,
    ) -> Result<Self, CalcError> {
        if ((bound + free) - (polymerizing + depolymerizing)).abs() > 1e-3 {
            return Err(CalcError(format!(
                "wrong count of MTs: {bound} bound + {free} free != \
                {polymerizing} polymerizing + {depolymerizing} depolymerizing"
            )));
        }
        Ok(Self {
            bound,
            free,
            polymerizing,
            depolymerizing,
        })
    }

    /// MTs attached to a kinetochore.
    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// MTs without attachment.
    pub fn free(&self) -> f64 {
        self.free
    }

    /// Growing MTs.
    pub fn polymerizing(&self) -> f64 {
        self.polymerizing
    }

    /// Shrinking MTs.
    pub fn depolymerizing(&self) -> f64 {
        self.depolymerizing
    }
}

/// Summary of one cell or of an ensemble of cells.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct CellStats {
    aggregated_cells: usize,
    mts_per_pole: usize,
    chromosome_pairs: usize,
    springs_broken: bool,
    mts: MtStats,
    min_bound_per_chromosome: Option<usize>,
    max_bound_per_chromosome: Option<usize>,
}

impl CellStats {
    /// Summarizes a single cell.
    pub fn from_cell(cell: &Cell) -> Result<Self, CalcError> {
        let (mut bound, mut free, mut poly, mut depoly) = (0usize, 0usize, 0usize, 0usize);
        for mt in cell.mts() {
            match mt.bound_chromosome_id() {
                Some(_) => bound += 1,
                None => free += 1,
            }
            match mt.state() {
                MtState::Polymerization => poly += 1,
                MtState::Depolymerization => depoly += 1,
            }
        }
        let kmts = CellOps::count_kmts(cell.data());
        let (chr_pairs, mts_per_pole) = cell.config();
        Ok(Self {
            aggregated_cells: 1,
            mts_per_pole,
            chromosome_pairs: chr_pairs,
            springs_broken: cell.are_springs_broken(),
            mts: MtStats::new(bound as f64, free as f64, poly as f64, depoly as f64)?,
            min_bound_per_chromosome: kmts.iter().copied().min(),
            max_bound_per_chromosome: kmts.iter().copied().max(),
        })
    }

    /// Combines the stats of cells sharing one configuration.
    ///
    /// Springs count as broken only if they are broken in all cells.
    /// MT counts are averaged.
    pub fn aggregate(stats: &[CellStats]) -> Result<Self, SimulationError> {
        let first = stats.first().ok_or_else(|| {
            CalcError("at least one cell's stats must be provided for aggregation".into())
        })?;
        let mut springs_broken = true;
        let (mut bound, mut free, mut poly, mut depoly) = (0.0, 0.0, 0.0, 0.0);
        let mut min_bound = first.min_bound_per_chromosome;
        let mut max_bound = first.max_bound_per_chromosome;
        for cur in stats {
            if cur.mts_per_pole != first.mts_per_pole
                || cur.chromosome_pairs != first.chromosome_pairs
            {
                return Err(CalcError(
                    "cannot aggregate cells with different configuration".into(),
                )
                .into());
            }
            springs_broken &= cur.springs_broken;
            bound += cur.mts.bound;
            free += cur.mts.free;
            poly += cur.mts.polymerizing;
            depoly += cur.mts.depolymerizing;
            min_bound = min_bound.min(cur.min_bound_per_chromosome);
            max_bound = max_bound.max(cur.max_bound_per_chromosome);
        }
        let n = stats.len() as f64;
        Ok(Self {
            aggregated_cells: stats.len(),
            mts_per_pole: first.mts_per_pole,
            chromosome_pairs: first.chromosome_pairs,
            springs_broken,
            mts: MtStats::new(bound / n, free / n, poly / n, depoly / n)?,
            min_bound_per_chromosome: min_bound,
            max_bound_per_chromosome: max_bound,
        })
    }

    /// Number of cells summarized.
    pub fn aggregated_cells(&self) -> usize {
        self.aggregated_cells
    }

    /// MTs per pole.
    pub fn mts_per_pole(&self) -> usize {
        self.mts_per_pole
    }

    /// Chromosome pairs per cell.
    pub fn chromosome_pairs(&self) -> usize {
        self.chromosome_pairs
    }

    /// Whether the springs are broken.
    pub fn springs_broken(&self) -> bool {
        self.springs_broken
    }

    /// MT counts.
    pub fn mts(&self) -> &MtStats {
        &self.mts
    }

    /// Fewest MTs bound to one chromosome. [None] without chromosomes.
    pub fn min_bound_per_chromosome(&self) -> Option<usize> {
        self.min_bound_per_chromosome
    }

    /// Most MTs bound to one chromosome. [None] without chromosomes.
    pub fn max_bound_per_chromosome(&self) -> Option<usize> {
        self.max_bound_per_chromosome
    }
}

#[cfg(test)]
mod test_stats {
    use super::*;

    fn sample_cell() -> Cell {
        let mut cell = Cell::new(1, 2);
        cell.mt_mut(0).unwrap().set_bound_chromosome(Some(0));
        cell.mt_mut(1).unwrap().set_bound_chromosome(Some(0));
        cell.mt_mut(2)
            .unwrap()
            .set_state(MtState::Depolymerization);
        cell
    }

    #[test]
    fn single_cell() {
        let stats = CellStats::from_cell(&sample_cell()).unwrap();
        assert_eq!(stats.aggregated_cells(), 1);
        assert_eq!(stats.mts_per_pole(), 2);
        assert_eq!(stats.chromosome_pairs(), 1);
        assert!(!stats.springs_broken());
        assert_eq!(stats.mts().bound(), 2.0);
        assert_eq!(stats.mts().free(), 2.0);
        assert_eq!(stats.mts().polymerizing(), 3.0);
        assert_eq!(stats.mts().depolymerizing(), 1.0);
        assert_eq!(stats.min_bound_per_chromosome(), Some(0));
        assert_eq!(stats.max_bound_per_chromosome(), Some(2));
    }

    #[test]
    fn aggregate_averages() {
        let mut broken = sample_cell();
        broken.break_springs();
        let a = CellStats::from_cell(&broken).unwrap();
        let b = CellStats::from_cell(&Cell::new(1, 2)).unwrap();
        let total = CellStats::aggregate(&[a, b]).unwrap();
        assert_eq!(total.aggregated_cells(), 2);
        assert!(!total.springs_broken());
        assert_eq!(total.mts().bound(), 1.0);
        assert_eq!(total.mts().depolymerizing(), 0.5);
        assert_eq!(total.max_bound_per_chromosome(), Some(2));
        assert_eq!(total.min_bound_per_chromosome(), Some(0));
    }

    #[test]
    fn aggregate_rejects_mixed_and_empty() {
        let a = CellStats::from_cell(&Cell::new(1, 2)).unwrap();
        let b = CellStats::from_cell(&Cell::new(2, 2)).unwrap();
        assert!(CellStats::aggregate(&[a, b]).is_err());
        assert!(CellStats::aggregate(&[]).is_err());
    }

    #[test]
    fn inconsistent_counts() {
        assert!(MtStats::new(1.0, 1.0, 1.0, 0.0).is_err());
        assert!(MtStats::new(1.0, 1.0, 1.5, 0.5).is_ok());
    }

    #[test]
    fn serializes_as_json() {
        let stats = CellStats::from_cell(&sample_cell()).unwrap();
        let json = serde_json::to_string(&stats).unwrap();
        let back: CellStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
