use micosi_concepts::{default_direct, Generator};

use crate::cell::Cell;
use crate::interfaces::PoleUpdater;

/// Moves the poles to their position at `time + dt`.
///
/// Bound MTs keep their kinetochore end in place, so their length and direction absorb
/// the displacement of their pole.
pub(crate) fn pole_step(
    cell: &mut Cell,
    rng: &mut Generator,
    updater: &dyn PoleUpdater,
    time: f64,
    dt: f64,
) {
    let (old_left, old_right) = cell.pole_positions();
    let (mut left, mut right) = (old_left, old_right);
    updater.move_poles(&mut left, &mut right, time + dt, rng);
    if left == old_left && right == old_right {
        return;
    }
    cell.set_pole_positions(left, right);
    let offsets = [left - old_left, right - old_right];
    for id in 0..cell.mt_count() {
        let mut mt = cell.mt_at_mut(id);
        if mt.bound_chromosome_id().is_none() {
            continue;
        }
        let new_vec = mt.direction() * mt.length() - offsets[mt.pole_type().index()];
        let length = new_vec.norm();
        mt.set_length(length);
        if length == 0.0 {
            mt.set_direction(&default_direct());
        } else {
            mt.set_direction(&new_vec.normalize());
        }
    }
}

#[cfg(test)]
mod test_pole {
    use super::*;
    use crate::cell::{CellObjectProvider, PoleType};
    use micosi_concepts::{RandomEngine, Vec3};

    struct Shift;

    impl PoleUpdater for Shift {
        fn set_initial(&self, _: &mut Vec3, _: &mut Vec3, _: &mut Generator) {}

        fn move_poles(&self, left: &mut Vec3, right: &mut Vec3, time: f64, _: &mut Generator) {
            left.x = -1.0 + time as micosi_concepts::Real;
            right.x = 1.0;
        }
    }

    #[test]
    fn bound_end_points_stay_fixed() {
        let mut cell = Cell::new(1, 1);
        cell.set_pole_positions(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        for id in 0..2 {
            let mut mt = cell.mt_mut(id).unwrap();
            mt.set_direction(&Vec3::new(0.0, 1.0, 0.0));
            mt.set_length(2.0);
        }
        cell.mt_mut(0).unwrap().set_bound_chromosome(Some(0));
        let bound_end = cell.mt(0).unwrap().end_point();
        let free_end = cell.mt(1).unwrap().end_point();

        let mut rng = Generator::from_seed_u32(0);
        pole_step(&mut cell, &mut rng, &Shift, 0.0, 0.5);

        assert_eq!(cell.pole(PoleType::Left).position().x, -0.5);
        let moved = cell.mt(0).unwrap().end_point();
        approx::assert_abs_diff_eq!(moved, bound_end, epsilon = 1e-5);
        approx::assert_relative_eq!(cell.mt(0).unwrap().direction().norm(), 1.0, epsilon = 1e-5);
        assert_eq!(cell.mt(1).unwrap().end_point(), free_end);
    }

    #[test]
    fn collapsed_mt_gets_default_direction() {
        let mut cell = Cell::new(1, 1);
        cell.set_pole_positions(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        {
            let mut mt = cell.mt_mut(0).unwrap();
            mt.set_direction(&Vec3::new(1.0, 0.0, 0.0));
            mt.set_length(0.5);
            mt.set_bound_chromosome(Some(1));
        }
        let mut rng = Generator::from_seed_u32(0);
        pole_step(&mut cell, &mut rng, &Shift, 0.0, 0.5);
        let mt = cell.mt(0).unwrap();
        assert_eq!(mt.length(), 0.0);
        assert_eq!(mt.direction(), default_direct());
    }
}
