//! Cell state stored as one aligned block of flat arrays.
//!
//! A [Cell] owns exactly one [CellData].
//! The objects of a cell (poles, MTs, chromosomes, chromosome pairs and springs) are not
//! stored separately.
//! They are index-based handles into the arrays of the block which resolve their relations
//! through the [CellObjectProvider] implemented by [Cell].

mod data;
mod objects;
mod ops;

pub use data::*;
pub use objects::*;
pub use ops::*;

use micosi_concepts::{Generator, Mat3, Real, Vec3};
use serde::{Deserialize, Serialize};

/// The two spindle poles.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PoleType {
    /// Pole at negative x
    Left = 0,
    /// Pole at positive x
    Right = 1,
}

impl PoleType {
    /// Index of the pole inside the pole arrays.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub(crate) fn from_word(word: u32) -> Self {
        if word == 0 {
            PoleType::Left
        } else {
            PoleType::Right
        }
    }
}

/// Dynamic instability state of a MT.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MtState {
    /// Growing
    Polymerization = 0,
    /// Shrinking
    Depolymerization = 1,
}

impl MtState {
    pub(crate) fn from_word(word: u32) -> Self {
        if word == 0 {
            MtState::Polymerization
        } else {
            MtState::Depolymerization
        }
    }
}

/// One simulated cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    data: CellData,
}

impl Cell {
    /// Creates a cell with `chr_pairs` chromosome pairs and `mts_per_pole` MTs on each pole.
    ///
    /// The first `mts_per_pole` MTs grow from the left pole.
    /// Pair `i` links chromosomes `2i` and `2i + 1`.
    /// All MTs are unbound, everything else is zero.
    pub fn new(chr_pairs: usize, mts_per_pole: usize) -> Self {
        let mut data = CellData::new(chr_pairs, mts_per_pole);
        data.words_mut(CellArray::PoleType)
            .copy_from_slice(&[PoleType::Left as u32, PoleType::Right as u32]);
        for (i, pole) in data.words_mut(CellArray::MtPole).iter_mut().enumerate() {
            *pole = if i < mts_per_pole {
                PoleType::Left as u32
            } else {
                PoleType::Right as u32
            };
        }
        data.ints_mut(CellArray::MtBoundChromosome).fill(-1);
        for (i, left) in data
            .words_mut(CellArray::ChrPairLeftChromosome)
            .iter_mut()
            .enumerate()
        {
            *left = 2 * i as u32;
        }
        for (i, right) in data
            .words_mut(CellArray::ChrPairRightChromosome)
            .iter_mut()
            .enumerate()
        {
            *right = 2 * i as u32 + 1;
        }
        Self { data }
    }

    /// Number of chromosome pairs and MTs per pole.
    pub fn config(&self) -> (usize, usize) {
        (self.data.chromosome_pairs(), self.data.mts_per_pole())
    }

    /// Total number of MTs.
    pub fn mt_count(&self) -> usize {
        self.data.mts_per_pole() * 2
    }

    /// Total number of chromosomes.
    pub fn chromosome_count(&self) -> usize {
        self.data.chromosome_pairs() * 2
    }

    /// Underlying arrays.
    pub fn data(&self) -> &CellData {
        &self.data
    }

    /// Underlying arrays, mutable.
    pub fn data_mut(&mut self) -> &mut CellData {
        &mut self.data
    }

    /// Whether the springs between sister chromosomes are broken.
    pub fn are_springs_broken(&self) -> bool {
        self.data.words(CellArray::SpringsBroken)[0] != 0
    }

    /// Breaks all springs. There is no way back.
    pub fn break_springs(&mut self) {
        self.data.words_mut(CellArray::SpringsBroken)[0] = 1;
    }

    pub(crate) fn set_springs_broken(&mut self, broken: bool) {
        self.data.words_mut(CellArray::SpringsBroken)[0] = broken as u32;
    }

    /// Both poles, left first.
    pub fn poles(&self) -> [Pole<'_>; 2] {
        [self.pole(PoleType::Left), self.pole(PoleType::Right)]
    }

    /// All MTs ordered by id.
    pub fn mts(&self) -> impl ExactSizeIterator<Item = Mt<'_>> {
        (0..self.mt_count()).map(move |id| Mt { cell: self, id })
    }

    /// All chromosomes ordered by id.
    pub fn chromosomes(&self) -> impl ExactSizeIterator<Item = Chromosome<'_>> {
        (0..self.chromosome_count()).map(move |id| Chromosome { cell: self, id })
    }

    /// All chromosome pairs ordered by id.
    pub fn chromosome_pairs(&self) -> impl ExactSizeIterator<Item = ChromosomePair<'_>> {
        (0..self.data.chromosome_pairs()).map(move |id| ChromosomePair { cell: self, id })
    }

    /// Springs of all chromosome pairs. Empty once the springs are broken.
    pub fn springs(&self) -> Vec<Spring<'_>> {
        self.chromosome_pairs().filter_map(|p| p.spring()).collect()
    }

    /// Mutable handle of a pole.
    pub fn pole_mut(&mut self, pole: PoleType) -> PoleMut<'_> {
        PoleMut {
            data: &mut self.data,
            pole,
        }
    }

    /// Mutable handle of a MT.
    pub fn mt_mut(&mut self, id: usize) -> Option<MtMut<'_>> {
        (id < self.mt_count()).then_some(MtMut {
            data: &mut self.data,
            id,
        })
    }

    /// Mutable handle of a chromosome.
    pub fn chromosome_mut(&mut self, id: usize) -> Option<ChromosomeMut<'_>> {
        (id < self.chromosome_count()).then_some(ChromosomeMut {
            data: &mut self.data,
            id,
        })
    }

    // Accessors for ids taken from the arrays of this very cell.
    // An out-of-range id is a logic error and panics on indexing.
    pub(crate) fn mt_at(&self, id: usize) -> Mt<'_> {
        Mt { cell: self, id }
    }

    pub(crate) fn mt_at_mut(&mut self, id: usize) -> MtMut<'_> {
        MtMut {
            data: &mut self.data,
            id,
        }
    }

    pub(crate) fn chromosome_at(&self, id: usize) -> Chromosome<'_> {
        Chromosome { cell: self, id }
    }

    pub(crate) fn chromosome_at_mut(&mut self, id: usize) -> ChromosomeMut<'_> {
        ChromosomeMut {
            data: &mut self.data,
            id,
        }
    }

    /// Position of the left and right pole.
    pub fn pole_positions(&self) -> (Vec3, Vec3) {
        (
            self.pole(PoleType::Left).position(),
            self.pole(PoleType::Right).position(),
        )
    }

    /// Overwrites both pole positions.
    pub fn set_pole_positions(&mut self, left: Vec3, right: Vec3) {
        self.pole_mut(PoleType::Left).set_position(left);
        self.pole_mut(PoleType::Right).set_position(right);
    }

    /// Sets the orientation of every chromosome to the identity.
    pub fn reset_orientations(&mut self) {
        for id in 0..self.chromosome_count() {
            ChromosomeMut {
                data: &mut self.data,
                id,
            }
            .set_orientation(&Mat3::identity());
        }
    }
}

/// A cell together with its private generator state.
#[derive(Clone, Debug)]
pub struct CellWithRng {
    /// The cell
    pub cell: Cell,
    /// Generator driving all stochastic updates of `cell`
    pub rng: Generator,
}

impl CellWithRng {
    /// Pairs a cell with a generator.
    pub fn new(cell: Cell, rng: Generator) -> Self {
        Self { cell, rng }
    }
}

pub(crate) fn read_vec3(data: &[Real], index: usize) -> Vec3 {
    Vec3::new(data[3 * index], data[3 * index + 1], data[3 * index + 2])
}

pub(crate) fn write_vec3(data: &mut [Real], index: usize, value: &Vec3) {
    data[3 * index] = value.x;
    data[3 * index + 1] = value.y;
    data[3 * index + 2] = value.z;
}

#[cfg(test)]
mod test_cell {
    use super::*;

    #[test]
    fn construction_links_objects() {
        let cell = Cell::new(2, 3);
        assert_eq!(cell.config(), (2, 3));
        assert_eq!(cell.mt_count(), 6);
        assert_eq!(cell.chromosome_count(), 4);
        for mt in cell.mts() {
            let expected = if mt.id() < 3 {
                PoleType::Left
            } else {
                PoleType::Right
            };
            assert_eq!(mt.pole().pole_type(), expected);
            assert!(mt.bound_chromosome().is_none());
            assert_eq!(mt.state(), MtState::Polymerization);
        }
        for pair in cell.chromosome_pairs() {
            assert_eq!(pair.left().id(), 2 * pair.id());
            assert_eq!(pair.right().id(), 2 * pair.id() + 1);
            assert_eq!(pair.left().pair().map(|p| p.id()), Some(pair.id()));
            assert_eq!(pair.right().pair().map(|p| p.id()), Some(pair.id()));
        }
        assert!(!cell.are_springs_broken());
        assert_eq!(cell.springs().len(), 2);
    }

    #[test]
    fn springs_disappear_after_breaking() {
        let mut cell = Cell::new(3, 1);
        cell.break_springs();
        assert!(cell.are_springs_broken());
        assert!(cell.springs().is_empty());
        assert!(cell.chromosome_pairs().all(|p| p.spring().is_none()));
    }

    #[test]
    fn empty_cell() {
        let cell = Cell::new(0, 0);
        assert_eq!(cell.mts().len(), 0);
        assert_eq!(cell.chromosomes().len(), 0);
        assert_eq!(cell.poles().len(), 2);
    }
}
