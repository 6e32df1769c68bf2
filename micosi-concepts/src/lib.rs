#![warn(missing_docs)]
//! Building blocks shared by every part of the MiCoSi mitotic spindle simulator.
//!
//! This crate contains the floating point [Real] type selected at build time, a small
//! [geometry] kernel, the reproducible [random] engine, the [params] registry and the
//! version tags written into stored simulations.

mod errors;
pub mod geometry;
pub mod params;
pub mod random;
mod version;

pub use errors::*;
pub use geometry::*;
pub use params::*;
pub use random::*;
pub use version::*;

/// Floating point type of all cell arrays.
#[cfg(feature = "fp64")]
pub type Real = f64;
/// Floating point type of all cell arrays.
#[cfg(not(feature = "fp64"))]
pub type Real = f32;

/// Three-dimensional vector in cell coordinates.
pub type Vec3 = nalgebra::Vector3<Real>;
/// 3x3 matrix used for rotations.
pub type Mat3 = nalgebra::Matrix3<Real>;

/// Archimedes' constant in [Real] precision.
#[cfg(feature = "fp64")]
pub const PI: Real = core::f64::consts::PI;
/// Archimedes' constant in [Real] precision.
#[cfg(not(feature = "fp64"))]
pub const PI: Real = core::f32::consts::PI;

/// Direction the chromosome arms point to before any rotation.
pub fn default_direct() -> Vec3 {
    Vec3::new(0.0, 0.0, -1.0)
}

/// Up direction of an unrotated chromosome.
pub fn default_up() -> Vec3 {
    Vec3::new(0.0, -1.0, 0.0)
}

/// Left direction of an unrotated chromosome, facing the left pole.
pub fn default_left() -> Vec3 {
    Vec3::new(-1.0, 0.0, 0.0)
}
