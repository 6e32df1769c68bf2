//! Implementations of [PoleUpdater](micosi_core::interfaces::PoleUpdater).

mod keyframe;

pub use keyframe::*;

use micosi_concepts::{default_left, DoubleParam, Generator, Real, SimParams, Vec3};
use micosi_core::interfaces::PoleUpdater;

/// Places the poles `l_poles` apart on the x axis and never moves them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticPoleUpdater {
    /// Distance between the poles in SI units
    pub l_poles: Real,
}

impl StaticPoleUpdater {
    /// Reads the pole distance from `params`.
    pub fn new(params: &SimParams) -> Self {
        Self {
            l_poles: params.get_double_si(DoubleParam::LPoles) as Real,
        }
    }
}

impl PoleUpdater for StaticPoleUpdater {
    fn set_initial(&self, left: &mut Vec3, right: &mut Vec3, _rng: &mut Generator) {
        *left = default_left() * (self.l_poles / 2.0);
        *right = -*left;
    }

    fn move_poles(&self, _: &mut Vec3, _: &mut Vec3, _: f64, _: &mut Generator) {}
}

/// Leaves the poles where a stored time layer put them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeserializingPoleUpdater;

impl PoleUpdater for DeserializingPoleUpdater {
    fn set_initial(&self, _: &mut Vec3, _: &mut Vec3, _: &mut Generator) {}

    fn move_poles(&self, _: &mut Vec3, _: &mut Vec3, _: f64, _: &mut Generator) {}
}
