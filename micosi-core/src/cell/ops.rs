use super::{CellArray, CellData};

/// Queries over the kinetochore bindings of a cell.
pub struct CellOps;

impl CellOps {
    /// Ids of the MTs bound to each chromosome, indexed by chromosome id.
    ///
    /// MTs appear in increasing id order.
    pub fn extract_kmts(data: &CellData) -> Vec<Vec<usize>> {
        let mut kmts = vec![Vec::new(); data.chromosome_pairs() * 2];
        for (mt, &bound) in data.ints(CellArray::MtBoundChromosome).iter().enumerate() {
            if bound >= 0 {
                if let Some(list) = kmts.get_mut(bound as usize) {
                    list.push(mt);
                }
            }
        }
        kmts
    }

    /// Number of MTs bound to each chromosome, indexed by chromosome id.
    pub fn count_kmts(data: &CellData) -> Vec<usize> {
        let mut counts = vec![0; data.chromosome_pairs() * 2];
        for &bound in data.ints(CellArray::MtBoundChromosome) {
            if bound >= 0 {
                if let Some(count) = counts.get_mut(bound as usize) {
                    *count += 1;
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod test_ops {
    use super::*;
    use crate::cell::Cell;

    #[test]
    fn groups_bound_mts_by_chromosome() {
        let mut cell = Cell::new(2, 3);
        cell.mt_mut(0).unwrap().set_bound_chromosome(Some(2));
        cell.mt_mut(4).unwrap().set_bound_chromosome(Some(2));
        cell.mt_mut(5).unwrap().set_bound_chromosome(Some(0));
        let kmts = CellOps::extract_kmts(cell.data());
        assert_eq!(kmts, vec![vec![5], vec![], vec![0, 4], vec![]]);
        assert_eq!(CellOps::count_kmts(cell.data()), vec![1, 0, 2, 0]);
    }

    #[test]
    fn no_chromosomes() {
        let cell = Cell::new(0, 4);
        assert!(CellOps::extract_kmts(cell.data()).is_empty());
        assert!(CellOps::count_kmts(cell.data()).is_empty());
    }
}
