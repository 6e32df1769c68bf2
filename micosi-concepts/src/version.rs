use serde::{Deserialize, Serialize};

use crate::errors::VersionError;

/// Program version of the form `major.minor.build`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Version {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
}

impl Version {
    /// Creates a new version triple.
    pub const fn new(major: u16, minor: u16, build: u16) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }
}

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Floating point precision used for cell arrays.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Precision {
    /// 32-bit floats
    Fp32,
    /// 64-bit floats
    Fp64,
}

/// Pseudo-random generator selected at build time.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum RngKind {
    /// Linear congruential generator
    Lcg,
    /// Mersenne Twister
    Mtg,
}

/// Build options which change the binary layout or the random streams of stored files.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct CompilationFlags {
    /// Precision of the `Real` type
    pub precision: Precision,
    /// Generator behind the random engine
    pub rng: RngKind,
}

impl CompilationFlags {
    /// Flags of the running build.
    pub const fn current() -> Self {
        Self {
            #[cfg(feature = "fp64")]
            precision: Precision::Fp64,
            #[cfg(not(feature = "fp64"))]
            precision: Precision::Fp32,
            #[cfg(feature = "rng-lcg")]
            rng: RngKind::Lcg,
            #[cfg(not(feature = "rng-lcg"))]
            rng: RngKind::Mtg,
        }
    }

    /// Numeric code stored inside the packed version word.
    pub fn code(&self) -> u8 {
        match (self.rng, self.precision) {
            (RngKind::Lcg, Precision::Fp32) => 0,
            (RngKind::Lcg, Precision::Fp64) => 1,
            (RngKind::Mtg, Precision::Fp32) => 2,
            (RngKind::Mtg, Precision::Fp64) => 3,
        }
    }

    /// Inverse of [CompilationFlags::code].
    pub fn from_code(code: u8) -> Option<Self> {
        let (rng, precision) = match code {
            0 => (RngKind::Lcg, Precision::Fp32),
            1 => (RngKind::Lcg, Precision::Fp64),
            2 => (RngKind::Mtg, Precision::Fp32),
            3 => (RngKind::Mtg, Precision::Fp64),
            _ => return None,
        };
        Some(Self { precision, rng })
    }
}

impl core::fmt::Display for CompilationFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let precision = match self.precision {
            Precision::Fp32 => "MICOSI_PRECISION_FP32",
            Precision::Fp64 => "MICOSI_PRECISION_FP64",
        };
        let rng = match self.rng {
            RngKind::Lcg => "MICOSI_RNG_LCG",
            RngKind::Mtg => "MICOSI_RNG_MTG",
        };
        write!(f, "{precision}; {rng}")
    }
}

/// Version of the running program.
pub const PROGRAM_VERSION: Version = Version::new(0, 9, 2);

/// Version of the binary file layout written by this program.
pub const FILE_FORMAT_VERSION: u8 = 2;

/// Decoded content of a packed version word.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VersionTag {
    /// Program version which wrote the file
    pub version: Version,
    /// Build flags of the program which wrote the file.
    /// [None] if the stored code is unknown.
    pub flags: Option<CompilationFlags>,
    /// File format version
    pub file_format: u8,
}

impl VersionTag {
    /// Tag describing the running program.
    pub fn current() -> Self {
        Self {
            version: PROGRAM_VERSION,
            flags: Some(CompilationFlags::current()),
            file_format: FILE_FORMAT_VERSION,
        }
    }

    /// Packs the tag as `major<<48 | minor<<32 | build<<16 | flags<<8 | file_format`.
    pub fn encode(&self) -> u64 {
        let flags = self.flags.map(|f| f.code()).unwrap_or(0xFF);
        ((self.version.major as u64) << 48)
            | ((self.version.minor as u64) << 32)
            | ((self.version.build as u64) << 16)
            | ((flags as u64) << 8)
            | self.file_format as u64
    }

    /// Unpacks a version word.
    pub fn decode(word: u64) -> Self {
        let file_format = (word & 0xFF) as u8;
        let flags = CompilationFlags::from_code(((word >> 8) & 0xFF) as u8);
        let build = ((word >> 16) & 0xFFFF) as u16;
        let minor = ((word >> 32) & 0xFFFF) as u16;
        let major = ((word >> 48) & 0xFFFF) as u16;
        Self {
            version: Version::new(major, minor, build),
            flags,
            file_format,
        }
    }

    /// Checks that a file carrying this tag can be read by the running program.
    pub fn check_compatible(&self) -> Result<(), VersionError> {
        if self.file_format != FILE_FORMAT_VERSION {
            return Err(VersionError::VersionConflict {
                current: PROGRAM_VERSION,
                required: self.version,
            });
        }
        let current = CompilationFlags::current();
        match self.flags {
            Some(flags) if flags == current => Ok(()),
            Some(flags) => Err(VersionError::CompilationConflict {
                current,
                required: flags,
            }),
            None => Err(VersionError::VersionConflict {
                current: PROGRAM_VERSION,
                required: self.version,
            }),
        }
    }
}
