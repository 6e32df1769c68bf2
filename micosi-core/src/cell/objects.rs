use micosi_concepts::{Mat3, Real, Vec3};

use super::{read_vec3, write_vec3, Cell, CellArray, CellData, MtState, PoleType};

/// Looks up the objects of a cell by id.
///
/// Views never hold references to each other.
/// Every relation (MT to chromosome, chromosome to pair, pair to spring) is resolved
/// through this trait.
pub trait CellObjectProvider {
    /// Pole of the given type.
    fn pole(&self, pole: PoleType) -> Pole<'_>;
    /// MT with the given id.
    fn mt(&self, id: usize) -> Option<Mt<'_>>;
    /// Chromosome with the given id.
    fn chromosome(&self, id: usize) -> Option<Chromosome<'_>>;
    /// Chromosome pair with the given id.
    fn chromosome_pair(&self, id: usize) -> Option<ChromosomePair<'_>>;
    /// Spring of the chromosome pair with the given id. [None] once springs are broken.
    fn spring(&self, id: usize) -> Option<Spring<'_>>;
}

impl CellObjectProvider for Cell {
    fn pole(&self, pole: PoleType) -> Pole<'_> {
        Pole { cell: self, pole }
    }

    fn mt(&self, id: usize) -> Option<Mt<'_>> {
        (id < self.mt_count()).then_some(Mt { cell: self, id })
    }

    fn chromosome(&self, id: usize) -> Option<Chromosome<'_>> {
        (id < self.chromosome_count()).then_some(Chromosome { cell: self, id })
    }

    fn chromosome_pair(&self, id: usize) -> Option<ChromosomePair<'_>> {
        (id < self.data().chromosome_pairs()).then_some(ChromosomePair { cell: self, id })
    }

    fn spring(&self, id: usize) -> Option<Spring<'_>> {
        if self.are_springs_broken() {
            return None;
        }
        self.chromosome_pair(id).map(|pair| Spring { pair })
    }
}

/// Read-only handle of one pole.
#[derive(Clone, Copy, Debug)]
pub struct Pole<'a> {
    pub(super) cell: &'a Cell,
    pub(super) pole: PoleType,
}

impl Pole<'_> {
    /// Which pole this is.
    pub fn pole_type(&self) -> PoleType {
        PoleType::from_word(self.cell.data().words(CellArray::PoleType)[self.pole.index()])
    }

    /// Current position.
    pub fn position(&self) -> Vec3 {
        read_vec3(
            self.cell.data().reals(CellArray::PolePosition),
            self.pole.index(),
        )
    }
}

/// Mutable handle of one pole.
#[derive(Debug)]
pub struct PoleMut<'a> {
    pub(super) data: &'a mut CellData,
    pub(super) pole: PoleType,
}

impl PoleMut<'_> {
    /// Current position.
    pub fn position(&self) -> Vec3 {
        read_vec3(self.data.reals(CellArray::PolePosition), self.pole.index())
    }

    /// Moves the pole.
    pub fn set_position(&mut self, position: Vec3) {
        write_vec3(
            self.data.reals_mut(CellArray::PolePosition),
            self.pole.index(),
            &position,
        );
    }
}

/// Read-only handle of one MT.
#[derive(Clone, Copy, Debug)]
pub struct Mt<'a> {
    pub(super) cell: &'a Cell,
    pub(super) id: usize,
}

macro_rules! mt_getters {
    ($data:ident) => {
        /// Id of the MT.
        pub fn id(&self) -> usize {
            self.id
        }

        /// Pole the MT grows from.
        pub fn pole_type(&self) -> PoleType {
            PoleType::from_word(self.$data().words(CellArray::MtPole)[self.id])
        }

        /// Normalized growth direction.
        pub fn direction(&self) -> Vec3 {
            let data = self.$data();
            Vec3::new(
                data.reals(CellArray::MtDirectionX)[self.id],
                data.reals(CellArray::MtDirectionY)[self.id],
                data.reals(CellArray::MtDirectionZ)[self.id],
            )
        }

        /// Offset of the force application point relative to the MT end.
        pub fn force_offset(&self) -> Vec3 {
            let data = self.$data();
            Vec3::new(
                data.reals(CellArray::MtForceOffsetX)[self.id],
                data.reals(CellArray::MtForceOffsetY)[self.id],
                data.reals(CellArray::MtForceOffsetZ)[self.id],
            )
        }

        /// Length measured from the pole.
        pub fn length(&self) -> Real {
            self.$data().reals(CellArray::MtLength)[self.id]
        }

        /// Dynamic instability state.
        pub fn state(&self) -> MtState {
            MtState::from_word(self.$data().words(CellArray::MtState)[self.id])
        }

        /// Id of the chromosome whose kinetochore holds the MT.
        pub fn bound_chromosome_id(&self) -> Option<usize> {
            let bound = self.$data().ints(CellArray::MtBoundChromosome)[self.id];
            (bound >= 0).then_some(bound as usize)
        }
    };
}

impl<'a> Mt<'a> {
    fn cell_data(&self) -> &'a CellData {
        self.cell.data()
    }

    mt_getters!(cell_data);

    /// Pole the MT grows from.
    pub fn pole(&self) -> Pole<'a> {
        self.cell.pole(self.pole_type())
    }

    /// Chromosome whose kinetochore holds the MT.
    pub fn bound_chromosome(&self) -> Option<Chromosome<'a>> {
        self.bound_chromosome_id()
            .and_then(|id| self.cell.chromosome(id))
    }

    /// Position of the growing end.
    pub fn end_point(&self) -> Vec3 {
        self.pole().position() + self.direction() * self.length()
    }
}

/// Mutable handle of one MT.
#[derive(Debug)]
pub struct MtMut<'a> {
    pub(super) data: &'a mut CellData,
    pub(super) id: usize,
}

impl MtMut<'_> {
    fn cell_data(&self) -> &CellData {
        &*self.data
    }

    mt_getters!(cell_data);

    /// Sets the pole the MT grows from.
    pub fn set_pole_type(&mut self, pole: PoleType) {
        self.data.words_mut(CellArray::MtPole)[self.id] = pole as u32;
    }

    /// Sets the growth direction.
    pub fn set_direction(&mut self, direction: &Vec3) {
        self.data.reals_mut(CellArray::MtDirectionX)[self.id] = direction.x;
        self.data.reals_mut(CellArray::MtDirectionY)[self.id] = direction.y;
        self.data.reals_mut(CellArray::MtDirectionZ)[self.id] = direction.z;
    }

    /// Sets the offset of the force application point.
    pub fn set_force_offset(&mut self, offset: &Vec3) {
        self.data.reals_mut(CellArray::MtForceOffsetX)[self.id] = offset.x;
        self.data.reals_mut(CellArray::MtForceOffsetY)[self.id] = offset.y;
        self.data.reals_mut(CellArray::MtForceOffsetZ)[self.id] = offset.z;
    }

    /// Sets the length.
    pub fn set_length(&mut self, length: Real) {
        self.data.reals_mut(CellArray::MtLength)[self.id] = length;
    }

    /// Sets the dynamic instability state.
    pub fn set_state(&mut self, state: MtState) {
        self.data.words_mut(CellArray::MtState)[self.id] = state as u32;
    }

    /// Binds the MT to a chromosome or releases it.
    pub fn set_bound_chromosome(&mut self, chromosome: Option<usize>) {
        self.data.ints_mut(CellArray::MtBoundChromosome)[self.id] =
            chromosome.map_or(-1, |id| id as i32);
    }
}

/// Read-only handle of one chromosome.
#[derive(Clone, Copy, Debug)]
pub struct Chromosome<'a> {
    pub(super) cell: &'a Cell,
    pub(super) id: usize,
}

impl<'a> Chromosome<'a> {
    /// Id of the chromosome.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Center position.
    pub fn position(&self) -> Vec3 {
        read_vec3(self.cell.data().reals(CellArray::ChrPosition), self.id)
    }

    /// Rotation of the chromosome frame.
    pub fn orientation(&self) -> Mat3 {
        let values = &self.cell.data().reals(CellArray::ChrOrientation)[9 * self.id..9 * self.id + 9];
        Mat3::from_row_slice(values)
    }

    /// Pair the chromosome belongs to.
    pub fn pair(&self) -> Option<ChromosomePair<'a>> {
        let data = self.cell.data();
        let lefts = data.words(CellArray::ChrPairLeftChromosome);
        let rights = data.words(CellArray::ChrPairRightChromosome);
        lefts
            .iter()
            .zip(rights)
            .position(|(&l, &r)| l as usize == self.id || r as usize == self.id)
            .and_then(|id| self.cell.chromosome_pair(id))
    }

    /// MTs attached to the kinetochore.
    pub fn bound_mts(&self) -> Vec<Mt<'a>> {
        self.cell
            .mts()
            .filter(|mt| mt.bound_chromosome_id() == Some(self.id))
            .collect()
    }
}

/// Mutable handle of one chromosome.
#[derive(Debug)]
pub struct ChromosomeMut<'a> {
    pub(super) data: &'a mut CellData,
    pub(super) id: usize,
}

impl ChromosomeMut<'_> {
    /// Center position.
    pub fn position(&self) -> Vec3 {
        read_vec3(self.data.reals(CellArray::ChrPosition), self.id)
    }

    /// Rotation of the chromosome frame.
    pub fn orientation(&self) -> Mat3 {
        Mat3::from_row_slice(&self.data.reals(CellArray::ChrOrientation)[9 * self.id..9 * self.id + 9])
    }

    /// Moves the chromosome.
    pub fn set_position(&mut self, position: &Vec3) {
        write_vec3(self.data.reals_mut(CellArray::ChrPosition), self.id, position);
    }

    /// Rotates the chromosome frame.
    pub fn set_orientation(&mut self, orientation: &Mat3) {
        let values =
            &mut self.data.reals_mut(CellArray::ChrOrientation)[9 * self.id..9 * self.id + 9];
        for row in 0..3 {
            for col in 0..3 {
                values[3 * row + col] = orientation[(row, col)];
            }
        }
    }
}

/// Read-only handle of two sister chromosomes.
#[derive(Clone, Copy, Debug)]
pub struct ChromosomePair<'a> {
    pub(super) cell: &'a Cell,
    pub(super) id: usize,
}

impl<'a> ChromosomePair<'a> {
    /// Id of the pair.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Id of the sister facing the left pole.
    pub fn left_id(&self) -> usize {
        self.cell.data().words(CellArray::ChrPairLeftChromosome)[self.id] as usize
    }

    /// Id of the sister facing the right pole.
    pub fn right_id(&self) -> usize {
        self.cell.data().words(CellArray::ChrPairRightChromosome)[self.id] as usize
    }

    /// Sister facing the left pole.
    pub fn left(&self) -> Chromosome<'a> {
        Chromosome {
            cell: self.cell,
            id: self.left_id(),
        }
    }

    /// Sister facing the right pole.
    pub fn right(&self) -> Chromosome<'a> {
        Chromosome {
            cell: self.cell,
            id: self.right_id(),
        }
    }

    /// Spring between the sisters while it is intact.
    pub fn spring(&self) -> Option<Spring<'a>> {
        self.cell.spring(self.id)
    }
}

/// Connection between two sister chromosomes.
#[derive(Clone, Copy, Debug)]
pub struct Spring<'a> {
    pub(super) pair: ChromosomePair<'a>,
}

impl<'a> Spring<'a> {
    /// The linked chromosomes.
    pub fn pair(&self) -> ChromosomePair<'a> {
        self.pair
    }

    /// Attachment point on the left sister.
    pub fn left_junction(&self) -> Vec3 {
        self.pair.left().position()
    }

    /// Attachment point on the right sister.
    pub fn right_junction(&self) -> Vec3 {
        self.pair.right().position()
    }

    /// Current length.
    pub fn length(&self) -> Real {
        (self.left_junction() - self.right_junction()).norm()
    }
}
