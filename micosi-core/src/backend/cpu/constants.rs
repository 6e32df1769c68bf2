use micosi_concepts::{DoubleParam, IntParam, Real, SimParams};

/// Criterion which breaks the springs of a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpringBrakeCriterion {
    /// Every chromosome holds at least this many MTs.
    BoundMts(usize),
    /// The pulling force on every chromosome reaches this value (SI).
    Force(Real),
}

/// Parameter values used by the stepping functions, converted to SI units once per change
/// of [SimParams].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepConstants {
    /// Time step in user units
    pub dt_user: f64,
    /// Time step
    pub dt: Real,
    /// Radius of the cell
    pub r_cell: Real,
    /// Pulling force of one kinetochore MT
    pub const_a: Real,
    /// Velocity dependence of the pulling force
    pub const_b: Real,
    /// Translational diffusion coefficient
    pub d_trans: Real,
    /// Rotational diffusion coefficient
    pub d_rot: Real,
    /// Translational drag
    pub gamma: Real,
    /// Rotational drag
    pub ieta: Real,
    /// Rest length of the spring between sisters
    pub spring_length: Real,
    /// Stiffness of the spring between sisters
    pub spring_k: Real,
    /// Whether the spring length follows the pulling forces
    pub moving_spring: bool,
    /// Whether chromosome pairs keep their center before the springs break
    pub frozen_coords: bool,
    /// Whether bound MTs wrap around the kinetochore
    pub mt_wrapping: bool,
    /// Length of a chromosome
    pub cr_l: Real,
    /// Length of the kinetochore
    pub cr_kin_l: Real,
    /// Radius of the kinetochore
    pub cr_kin_r: Real,
    /// Cosine of half the kinetochore acceptance angle
    pub cr_kin_cosa: Real,
    /// Radius of the chromosome hands
    pub cr_hand_r: Real,
    /// Polymerization velocity
    pub v_pol: Real,
    /// Depolymerization velocity
    pub v_dep: Real,
    /// Catastrophe frequency
    pub f_cat: Real,
    /// Rescue frequency
    pub f_res: Real,
    /// Binding rate
    pub k_on: Real,
    /// Unbinding rate
    pub k_off: Real,
    /// Maximum number of MTs on one kinetochore
    pub n_kmt_max: usize,
    /// When springs break
    pub spring_brake: SpringBrakeCriterion,
}

impl StepConstants {
    /// Reads all values from `params`.
    pub fn new(params: &SimParams) -> Self {
        let si = |p: DoubleParam| params.get_double_si(p) as Real;
        let int = |p: IntParam| params.get_int(p);
        let spring_brake = if int(IntParam::SpringBrakeType) == 1 {
            SpringBrakeCriterion::BoundMts(int(IntParam::SpringBrakeMts).max(0) as usize)
        } else {
            SpringBrakeCriterion::Force(si(DoubleParam::SpringBrakeForce))
        };
        Self {
            dt_user: params.get_double(DoubleParam::Dt),
            dt: si(DoubleParam::Dt),
            r_cell: si(DoubleParam::RCell),
            const_a: si(DoubleParam::ConstA),
            const_b: si(DoubleParam::ConstB),
            d_trans: si(DoubleParam::DTrans),
            d_rot: si(DoubleParam::DRot),
            gamma: si(DoubleParam::Gamma),
            ieta: si(DoubleParam::Ieta),
            spring_length: si(DoubleParam::SpringLength),
            spring_k: si(DoubleParam::SpringK),
            moving_spring: int(IntParam::SpringType) == 1,
            frozen_coords: int(IntParam::FrozenCoords) != 0,
            mt_wrapping: int(IntParam::MtWrapping) != 0,
            cr_l: si(DoubleParam::CrL),
            cr_kin_l: si(DoubleParam::CrKinL),
            cr_kin_r: si(DoubleParam::CrKinD) / 2.0,
            cr_kin_cosa: (params.get_double_si(DoubleParam::CrKinAngle) / 2.0).cos() as Real,
            cr_hand_r: si(DoubleParam::CrHandD) / 2.0,
            v_pol: si(DoubleParam::VPol),
            v_dep: si(DoubleParam::VDep),
            f_cat: si(DoubleParam::FCat),
            f_res: si(DoubleParam::FRes),
            k_on: si(DoubleParam::KOn),
            k_off: si(DoubleParam::KOff),
            n_kmt_max: int(IntParam::NKmtMax).max(0) as usize,
            spring_brake,
        }
    }

    /// Zero-length threshold of the geometry kernel.
    pub fn geometry_epsilon(&self) -> Real {
        self.r_cell * 1e-5
    }
}

#[cfg(test)]
mod test_constants {
    use super::*;
    use micosi_concepts::Access;

    #[test]
    fn converts_to_si() {
        let c = StepConstants::new(&SimParams::new());
        approx::assert_relative_eq!(c.r_cell, 8e-6, max_relative = 1e-5);
        approx::assert_relative_eq!(c.cr_kin_r, 0.15e-6, max_relative = 1e-5);
        approx::assert_relative_eq!(c.v_pol, 12.8e-6 / 60.0, max_relative = 1e-5);
        assert_eq!(c.dt_user, 0.1);
        assert_eq!(c.spring_brake, SpringBrakeCriterion::Force(700e-12 as Real));
        assert!(c.mt_wrapping);
        assert!(!c.moving_spring);
    }

    #[test]
    fn count_criterion() {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        params.set_int(IntParam::SpringBrakeType, 1).unwrap();
        params.set_int(IntParam::SpringBrakeMts, 3).unwrap();
        let c = StepConstants::new(&params);
        assert_eq!(c.spring_brake, SpringBrakeCriterion::BoundMts(3));
    }
}
