use micosi_concepts::{Real, Vec3};

use super::constants::{SpringBrakeCriterion, StepConstants};
use crate::cell::{Cell, CellOps};

/// Smallest sum of pulling forces over all chromosomes.
fn min_pulling_force(cell: &Cell, c: &StepConstants, kmts: &[Vec<usize>]) -> Real {
    let mut min_force = Real::MAX;
    for (cr, bound) in kmts.iter().enumerate() {
        let pos = cell.chromosome_at(cr).position();
        let force = bound.iter().fold(Vec3::zeros(), |acc, &id| {
            let pole = cell.mt_at(id).pole().position();
            acc + (pole - pos).normalize() * c.const_a
        });
        min_force = min_force.min(force.norm());
    }
    min_force
}

/// Breaks the springs of the cell once the configured criterion holds for every chromosome.
///
/// Returns whether the springs broke during this call.
pub(crate) fn spring_step(cell: &mut Cell, c: &StepConstants) -> bool {
    if cell.chromosome_count() == 0 || cell.are_springs_broken() {
        return false;
    }
    let kmts = CellOps::extract_kmts(cell.data());
    let brake = match c.spring_brake {
        SpringBrakeCriterion::BoundMts(required) => kmts
            .iter()
            .map(|bound| bound.len())
            .min()
            .is_some_and(|min| min >= required),
        SpringBrakeCriterion::Force(required) => min_pulling_force(cell, c, &kmts) >= required,
    };
    if brake {
        cell.break_springs();
    }
    brake
}

#[cfg(test)]
mod test_spring {
    use super::*;
    use crate::cell::CellObjectProvider;
    use micosi_concepts::{Access, DoubleParam, IntParam, SimParams};

    fn count_constants(required: i32) -> StepConstants {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        params.set_int(IntParam::SpringBrakeType, 1).unwrap();
        params.set_int(IntParam::SpringBrakeMts, required).unwrap();
        StepConstants::new(&params)
    }

    fn cell() -> Cell {
        let mut cell = Cell::new(1, 2);
        cell.set_pole_positions(Vec3::new(-5e-6, 0.0, 0.0), Vec3::new(5e-6, 0.0, 0.0));
        cell.chromosome_mut(0)
            .unwrap()
            .set_position(&Vec3::new(-0.5e-6, 0.0, 0.0));
        cell.chromosome_mut(1)
            .unwrap()
            .set_position(&Vec3::new(0.5e-6, 0.0, 0.0));
        cell
    }

    #[test]
    fn count_criterion_needs_every_chromosome() {
        let c = count_constants(1);
        let mut cell = cell();
        cell.mt_mut(0).unwrap().set_bound_chromosome(Some(0));
        assert!(!spring_step(&mut cell, &c));
        assert!(cell.spring(0).is_some());

        cell.mt_mut(2).unwrap().set_bound_chromosome(Some(1));
        assert!(spring_step(&mut cell, &c));
        assert!(cell.are_springs_broken());
        assert!(cell.spring(0).is_none());
    }

    #[test]
    fn broken_springs_stay_broken() {
        let c = count_constants(1);
        let mut cell = cell();
        cell.break_springs();
        assert!(!spring_step(&mut cell, &c));
        assert!(cell.are_springs_broken());
    }

    #[test]
    fn force_criterion() {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        // one MT pulls with const_a = 45 pN
        params.set_double(DoubleParam::SpringBrakeForce, 80.0).unwrap();
        let c = StepConstants::new(&params);
        let mut cell = cell();
        cell.mt_mut(0).unwrap().set_bound_chromosome(Some(0));
        cell.mt_mut(2).unwrap().set_bound_chromosome(Some(1));
        assert!(!spring_step(&mut cell, &c));

        cell.mt_mut(1).unwrap().set_bound_chromosome(Some(0));
        assert!(!spring_step(&mut cell, &c));
        cell.mt_mut(3).unwrap().set_bound_chromosome(Some(1));
        assert!(spring_step(&mut cell, &c));
    }

    #[test]
    fn empty_cell_never_breaks() {
        let c = count_constants(0);
        let mut cell = Cell::new(0, 1);
        assert!(!spring_step(&mut cell, &c));
        assert!(!cell.are_springs_broken());
    }
}
