use micosi_concepts::{
    Generator, Geometry, Mat3, RandomEngine, Real, Rectangle, SemiCircle, SemiTube, Segment, Vec3,
    PI,
};

use super::constants::StepConstants;
use crate::cell::{Cell, CellOps, MtState, PoleType};

fn axes(orient: &Mat3) -> (Vec3, Vec3, Vec3) {
    (
        (orient * Vec3::new(1.0, 0.0, 0.0)).normalize(),
        (orient * Vec3::new(0.0, 1.0, 0.0)).normalize(),
        (orient * Vec3::new(0.0, 0.0, 1.0)).normalize(),
    )
}

fn hits_hand(geom: &Geometry, seg: &Segment, hand_beg: Vec3, hand_end: Vec3, r1: Vec3, r2: Vec3) -> bool {
    geom.intersect_semitube(
        seg,
        &SemiTube {
            p1: hand_beg,
            p2: hand_end,
            r: r2,
        },
    )
    .is_some()
        || geom
            .intersect_rectangle(
                seg,
                &Rectangle {
                    p: hand_beg - r1,
                    v1: r1 * 2.0,
                    v2: hand_end - hand_beg,
                },
            )
            .is_some()
        || geom
            .intersect_semicircle(seg, &SemiCircle { p: hand_beg, r1, r2 })
            .is_some()
        || geom
            .intersect_semicircle(seg, &SemiCircle { p: hand_end, r1, r2 })
            .is_some()
}

/// Whether the segment hits the arms or the back of the kinetochore of any chromosome.
fn hits_chromosome_body(geom: &Geometry, c: &StepConstants, cell: &Cell, seg: &Segment) -> bool {
    for chr in cell.chromosomes() {
        let pos = chr.position();
        let (ort_x, ort_y, ort_z) = axes(&chr.orientation());
        let r1 = ort_z * -c.cr_hand_r;
        let r2 = ort_x * c.cr_hand_r;

        let upper_beg = pos + ort_y * (c.cr_kin_l / 2.0);
        let upper_end = pos + ort_y * (c.cr_l / 2.0);
        if hits_hand(geom, seg, upper_beg, upper_end, r1, r2) {
            return true;
        }

        let lower_beg = pos + ort_y * (-c.cr_kin_l / 2.0);
        let lower_end = pos + ort_y * (-c.cr_l / 2.0);
        if hits_hand(geom, seg, lower_beg, lower_end, r1, r2) {
            return true;
        }

        let back = Rectangle {
            p: lower_beg - ort_z * c.cr_kin_r,
            v1: ort_z * (2.0 * c.cr_kin_r),
            v2: ort_y * c.cr_kin_l,
        };
        if geom.intersect_rectangle(seg, &back).is_some() {
            return true;
        }
    }
    false
}

/// Nearest kinetochore accepting the segment within its angular window.
///
/// Returns the chromosome id and the distance of the contact from `seg.p1`, together with
/// whether the segment touched any kinetochore at all.
fn nearest_kinetochore(
    geom: &Geometry,
    c: &StepConstants,
    cell: &Cell,
    seg: &Segment,
    max_len: Real,
) -> (Option<(usize, Real)>, bool) {
    let mut nearest: Option<(usize, Real)> = None;
    let mut min_len = max_len;
    let mut touched = false;
    for chr in cell.chromosomes() {
        let pos = chr.position();
        let orient = chr.orientation();
        let (ort_x, ort_y, _) = axes(&orient);
        let tube = SemiTube {
            p1: pos + orient * Vec3::new(0.0, -c.cr_kin_l / 2.0, 0.0),
            p2: pos + orient * Vec3::new(0.0, c.cr_kin_l / 2.0, 0.0),
            r: ort_x * c.cr_kin_r,
        };
        if let Some(point) = geom.intersect_semitube(seg, &tube) {
            let mut dp = point - tube.p1;
            dp -= ort_y * dp.dot(&ort_y);
            let dist = (point - seg.p1).norm();
            if dp.dot(&ort_x) >= c.cr_kin_cosa * c.cr_kin_r && dist <= min_len {
                nearest = Some((chr.id(), dist));
                min_len = dist;
            }
            touched = true;
        }
    }
    (nearest, touched)
}

/// Dynamic instability, collisions and kinetochore capture of every MT.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub(crate) fn micro_step(cell: &mut Cell, rng: &mut Generator, c: &StepConstants) {
    let geom = Geometry::new(c.geometry_epsilon());
    let mut kmts = CellOps::count_kmts(cell.data());

    for id in 0..cell.mt_count() {
        let bound = cell.mt_at(id).bound_chromosome_id();
        if let Some(chr) = bound {
            if rng.next_real() < c.k_off * c.dt {
                let mut mt = cell.mt_at_mut(id);
                mt.set_bound_chromosome(None);
                mt.set_state(MtState::Depolymerization);
                kmts[chr] -= 1;
            }
            continue;
        }

        {
            let mut mt = cell.mt_at_mut(id);
            match mt.state() {
                MtState::Polymerization => {
                    mt.set_length(mt.length() + c.v_pol * c.dt);
                    if rng.next_real() < c.f_cat * c.dt {
                        mt.set_state(MtState::Depolymerization);
                    }
                }
                MtState::Depolymerization => {
                    let length = (mt.length() - c.v_dep * c.dt).max(0.0);
                    mt.set_length(length);
                    if length == 0.0 || rng.next_real() < c.f_res * c.dt {
                        mt.set_state(MtState::Polymerization);
                        if length == 0.0 {
                            let alpha = rng.next_real() as f64 * PI as f64 * 2.0;
                            let sign = if mt.pole_type() == PoleType::Left {
                                1.0
                            } else {
                                -1.0
                            };
                            let dx = rng.next_real() * sign;
                            let side = (1.0 - dx as f64 * dx as f64).sqrt();
                            mt.set_direction(&Vec3::new(
                                dx,
                                (side * alpha.cos()) as Real,
                                (side * alpha.sin()) as Real,
                            ));
                        }
                    }
                }
            }
        }

        let (beg, end, length, mut state) = {
            let mt = cell.mt_at(id);
            (mt.pole().position(), mt.end_point(), mt.length(), mt.state())
        };
        if state == MtState::Polymerization && end.norm() >= c.r_cell {
            state = MtState::Depolymerization;
        }

        let seg = Segment::new(beg, end);
        if state == MtState::Polymerization && hits_chromosome_body(&geom, c, cell, &seg) {
            state = MtState::Depolymerization;
        }

        let (nearest, touched) = nearest_kinetochore(&geom, c, cell, &seg, length);
        if touched {
            state = MtState::Depolymerization;
        }

        let mut mt = cell.mt_at_mut(id);
        mt.set_state(state);
        if let Some((chr, distance)) = nearest {
            if kmts[chr] < c.n_kmt_max && rng.next_real() < c.k_on * c.dt {
                mt.set_bound_chromosome(Some(chr));
                kmts[chr] += 1;
            }
            mt.set_length(distance);
        }
    }
}

#[cfg(test)]
mod test_micro {
    use super::*;
    use crate::cell::CellObjectProvider;
    use micosi_concepts::{Access, DoubleParam, SimParams};

    fn constants(setup: impl FnOnce(&mut SimParams)) -> StepConstants {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        setup(&mut params);
        StepConstants::new(&params)
    }

    fn lone_mt_cell(direction: Vec3, length: Real, state: MtState) -> Cell {
        let mut cell = Cell::new(0, 1);
        cell.set_pole_positions(Vec3::new(-5e-6, 0.0, 0.0), Vec3::new(5e-6, 0.0, 0.0));
        let mut mt = cell.mt_mut(0).unwrap();
        mt.set_direction(&direction);
        mt.set_length(length);
        mt.set_state(state);
        cell
    }

    #[test]
    fn polymerizing_mt_grows() {
        let c = constants(|p| p.set_double(DoubleParam::FCat, 0.0).unwrap());
        let mut cell = lone_mt_cell(Vec3::new(1.0, 0.0, 0.0), 1e-6, MtState::Polymerization);
        let mut rng = Generator::from_seed_u32(1);
        micro_step(&mut cell, &mut rng, &c);
        let mt = cell.mt(0).unwrap();
        approx::assert_relative_eq!(mt.length(), 1e-6 + c.v_pol * c.dt, max_relative = 1e-5);
        assert_eq!(mt.state(), MtState::Polymerization);
    }

    #[test]
    fn leaving_the_cell_starts_shrinking() {
        let c = constants(|p| p.set_double(DoubleParam::FCat, 0.0).unwrap());
        // pole at x = -5um, cell radius 8um: the tip passes the boundary
        let mut cell = lone_mt_cell(Vec3::new(-1.0, 0.0, 0.0), 3.5e-6, MtState::Polymerization);
        let mut rng = Generator::from_seed_u32(1);
        micro_step(&mut cell, &mut rng, &c);
        assert_eq!(cell.mt(0).unwrap().state(), MtState::Depolymerization);
    }

    #[test]
    fn fully_shrunk_mt_is_rescued_towards_its_side() {
        let c = constants(|_| {});
        let mut cell = lone_mt_cell(Vec3::new(0.0, 1.0, 0.0), 0.0, MtState::Depolymerization);
        let mut rng = Generator::from_seed_u32(5);
        micro_step(&mut cell, &mut rng, &c);
        let mt = cell.mt(0).unwrap();
        assert_eq!(mt.state(), MtState::Polymerization);
        assert_eq!(mt.length(), 0.0);
        let dir = mt.direction();
        assert!(dir.x >= 0.0);
        approx::assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn bound_mt_stays_without_k_off() {
        let c = constants(|p| p.set_double(DoubleParam::KOff, 0.0).unwrap());
        let mut cell = Cell::new(1, 1);
        cell.reset_orientations();
        cell.mt_mut(0).unwrap().set_bound_chromosome(Some(0));
        let mut rng = Generator::from_seed_u32(5);
        for _ in 0..100 {
            micro_step(&mut cell, &mut rng, &c);
        }
        assert_eq!(cell.mt(0).unwrap().bound_chromosome_id(), Some(0));
    }

    #[test]
    fn bound_mt_detaches_with_high_k_off() {
        let c = constants(|p| p.set_double(DoubleParam::KOff, 100.0).unwrap());
        let mut cell = Cell::new(1, 1);
        cell.reset_orientations();
        cell.mt_mut(0).unwrap().set_bound_chromosome(Some(0));
        let mut rng = Generator::from_seed_u32(5);
        micro_step(&mut cell, &mut rng, &c);
        let mt = cell.mt(0).unwrap();
        assert!(mt.bound_chromosome_id().is_none());
        assert_eq!(mt.state(), MtState::Depolymerization);
    }

    #[test]
    fn mt_hitting_the_kinetochore_is_captured() {
        let c = constants(|p| {
            p.set_double(DoubleParam::KOn, 100.0).unwrap();
            p.set_double(DoubleParam::FCat, 0.0).unwrap();
        });
        let mut cell = Cell::new(1, 1);
        cell.set_pole_positions(Vec3::new(-5e-6, 0.0, 0.0), Vec3::new(5e-6, 0.0, 0.0));
        cell.reset_orientations();
        // chromosome 0 faces -x with its kinetochore
        cell.chromosome_mut(0)
            .unwrap()
            .set_orientation(&micosi_concepts::rotation_y(PI));
        let mut mt = cell.mt_mut(0).unwrap();
        mt.set_direction(&Vec3::new(1.0, 0.0, 0.0));
        mt.set_length(4.95e-6);

        let mut rng = Generator::from_seed_u32(9);
        micro_step(&mut cell, &mut rng, &c);
        let mt = cell.mt(0).unwrap();
        assert_eq!(mt.bound_chromosome_id(), Some(0));
        assert_eq!(mt.state(), MtState::Depolymerization);
        approx::assert_relative_eq!(mt.length(), 5e-6 - c.cr_kin_r, max_relative = 1e-3);
    }
}
