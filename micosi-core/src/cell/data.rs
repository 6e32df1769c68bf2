use bytemuck::{Pod, Zeroable};
use micosi_concepts::Real;

/// Alignment of every array inside [CellData] in bytes.
pub const CELL_ARRAY_ALIGNMENT: usize = 64;

/// Kinds of arrays stored in a [CellData] block.
///
/// The discriminant is the index into the offset table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum CellArray {
    /// `Real * 3` per pole
    PolePosition = 0,
    /// `u32` per pole
    PoleType = 1,
    /// `u32` per MT
    MtPole = 2,
    /// `Real` per MT
    MtDirectionX = 3,
    /// `Real` per MT
    MtDirectionY = 4,
    /// `Real` per MT
    MtDirectionZ = 5,
    /// `Real` per MT
    MtForceOffsetX = 6,
    /// `Real` per MT
    MtForceOffsetY = 7,
    /// `Real` per MT
    MtForceOffsetZ = 8,
    /// `Real` per MT
    MtLength = 9,
    /// `u32` per MT
    MtState = 10,
    /// `i32` per MT, negative values mark unbound MTs
    MtBoundChromosome = 11,
    /// `Real * 3` per chromosome
    ChrPosition = 12,
    /// `Real * 9` per chromosome, row-major
    ChrOrientation = 13,
    /// `u32` per chromosome pair
    ChrPairLeftChromosome = 14,
    /// `u32` per chromosome pair
    ChrPairRightChromosome = 15,
    /// single `u32`
    SpringsBroken = 16,
}

/// Number of variants of [CellArray].
pub const CELL_ARRAY_COUNT: usize = 17;

impl CellArray {
    /// All array kinds in storage order.
    pub const ALL: [CellArray; CELL_ARRAY_COUNT] = [
        CellArray::PolePosition,
        CellArray::PoleType,
        CellArray::MtPole,
        CellArray::MtDirectionX,
        CellArray::MtDirectionY,
        CellArray::MtDirectionZ,
        CellArray::MtForceOffsetX,
        CellArray::MtForceOffsetY,
        CellArray::MtForceOffsetZ,
        CellArray::MtLength,
        CellArray::MtState,
        CellArray::MtBoundChromosome,
        CellArray::ChrPosition,
        CellArray::ChrOrientation,
        CellArray::ChrPairLeftChromosome,
        CellArray::ChrPairRightChromosome,
        CellArray::SpringsBroken,
    ];

    /// Size of the array in bytes, without alignment padding.
    pub fn size(&self, chr_pairs: usize, mts_per_pole: usize) -> usize {
        let real = core::mem::size_of::<Real>();
        let word = core::mem::size_of::<u32>();
        let mts = mts_per_pole * 2;
        let chrs = chr_pairs * 2;
        match self {
            CellArray::PolePosition => real * 3 * 2,
            CellArray::PoleType => word * 2,
            CellArray::MtPole | CellArray::MtState | CellArray::MtBoundChromosome => word * mts,
            CellArray::MtDirectionX
            | CellArray::MtDirectionY
            | CellArray::MtDirectionZ
            | CellArray::MtForceOffsetX
            | CellArray::MtForceOffsetY
            | CellArray::MtForceOffsetZ
            | CellArray::MtLength => real * mts,
            CellArray::ChrPosition => real * 3 * chrs,
            CellArray::ChrOrientation => real * 9 * chrs,
            CellArray::ChrPairLeftChromosome | CellArray::ChrPairRightChromosome => {
                word * chr_pairs
            }
            CellArray::SpringsBroken => word,
        }
    }
}

#[derive(Clone, Copy)]
#[repr(C, align(64))]
struct AlignedChunk([u8; CELL_ARRAY_ALIGNMENT]);

// SAFETY: plain bytes with size equal to alignment, no padding and every bit pattern valid.
unsafe impl Zeroable for AlignedChunk {}
// SAFETY: see above.
unsafe impl Pod for AlignedChunk {}

/// One contiguous block holding all arrays of a cell.
///
/// Each array starts at a multiple of [CELL_ARRAY_ALIGNMENT] bytes.
/// Cloning copies the whole block and the offset table.
#[derive(Clone)]
pub struct CellData {
    chr_pairs: usize,
    mts_per_pole: usize,
    offsets: [usize; CELL_ARRAY_COUNT],
    block: Vec<AlignedChunk>,
}

impl core::fmt::Debug for CellData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CellData")
            .field("chr_pairs", &self.chr_pairs)
            .field("mts_per_pole", &self.mts_per_pole)
            .field("data_size", &self.data_size())
            .finish()
    }
}

impl PartialEq for CellData {
    fn eq(&self, other: &Self) -> bool {
        self.chr_pairs == other.chr_pairs
            && self.mts_per_pole == other.mts_per_pole
            && self.bytes() == other.bytes()
    }
}

impl CellData {
    /// Allocates a zeroed block for the given number of chromosome pairs and MTs per pole.
    pub fn new(chr_pairs: usize, mts_per_pole: usize) -> Self {
        let mut offsets = [0; CELL_ARRAY_COUNT];
        let mut data_size = 0;
        for kind in CellArray::ALL {
            offsets[kind as usize] = data_size;
            let size = kind.size(chr_pairs, mts_per_pole);
            data_size += size.div_ceil(CELL_ARRAY_ALIGNMENT) * CELL_ARRAY_ALIGNMENT;
        }
        Self {
            chr_pairs,
            mts_per_pole,
            offsets,
            block: vec![AlignedChunk([0; CELL_ARRAY_ALIGNMENT]); data_size / CELL_ARRAY_ALIGNMENT],
        }
    }

    /// Number of chromosome pairs the block was created for.
    pub fn chromosome_pairs(&self) -> usize {
        self.chr_pairs
    }

    /// Number of MTs per pole the block was created for.
    pub fn mts_per_pole(&self) -> usize {
        self.mts_per_pole
    }

    /// Total size of the block in bytes.
    pub fn data_size(&self) -> usize {
        self.block.len() * CELL_ARRAY_ALIGNMENT
    }

    /// Byte offsets of all arrays, indexed by [CellArray].
    pub fn offsets(&self) -> &[usize; CELL_ARRAY_COUNT] {
        &self.offsets
    }

    /// The whole block.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.block)
    }

    /// The whole block, mutable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.block)
    }

    fn range(&self, kind: CellArray) -> core::ops::Range<usize> {
        let start = self.offsets[kind as usize];
        start..start + kind.size(self.chr_pairs, self.mts_per_pole)
    }

    /// Typed view of one array.
    ///
    /// # Panics
    /// If `T` does not have the element size of `kind`.
    pub fn array<T: Pod>(&self, kind: CellArray) -> &[T] {
        let range = self.range(kind);
        bytemuck::cast_slice(&self.bytes()[range])
    }

    /// Typed mutable view of one array.
    ///
    /// # Panics
    /// If `T` does not have the element size of `kind`.
    pub fn array_mut<T: Pod>(&mut self, kind: CellArray) -> &mut [T] {
        let range = self.range(kind);
        bytemuck::cast_slice_mut(&mut self.bytes_mut()[range])
    }

    pub(crate) fn reals(&self, kind: CellArray) -> &[Real] {
        self.array(kind)
    }

    pub(crate) fn reals_mut(&mut self, kind: CellArray) -> &mut [Real] {
        self.array_mut(kind)
    }

    pub(crate) fn words(&self, kind: CellArray) -> &[u32] {
        self.array(kind)
    }

    pub(crate) fn words_mut(&mut self, kind: CellArray) -> &mut [u32] {
        self.array_mut(kind)
    }

    pub(crate) fn ints(&self, kind: CellArray) -> &[i32] {
        self.array(kind)
    }

    pub(crate) fn ints_mut(&mut self, kind: CellArray) -> &mut [i32] {
        self.array_mut(kind)
    }
}
