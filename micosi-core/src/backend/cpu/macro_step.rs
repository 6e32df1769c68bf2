use micosi_concepts::{rotation_xyz, Generator, Geometry, Mat3, RandomEngine, Real, Segment, Vec3, PI};

use super::constants::StepConstants;
use super::solver::{solve_motion_system, MotionSystem};
use crate::cell::{Cell, CellOps};

fn unit_y(orient: &Mat3) -> Vec3 {
    (orient * Vec3::new(0.0, 1.0, 0.0)).normalize()
}

fn unit_x(orient: &Mat3) -> Vec3 {
    (orient * Vec3::new(1.0, 0.0, 0.0)).normalize()
}

/// Point on the kinetochore surface where a bound MT pulls if it wraps around the kinetochore.
///
/// Without contact between the MT and the kinetochore cylinder this is the MT end itself.
fn wrapped_force_point(
    geom: &Geometry,
    c: &StepConstants,
    chr_pos: Vec3,
    orient: &Mat3,
    pole: Vec3,
    mt_end: Vec3,
) -> Vec3 {
    let r = c.cr_kin_r;
    let ort_z = unit_y(orient);

    let mt_end_proj = mt_end + ort_z * ort_z.dot(&(chr_pos - mt_end));
    let pole_proj = pole + ort_z * ort_z.dot(&(chr_pos - pole));

    if geom.distance_point_segment(&chr_pos, &Segment::new(mt_end_proj, pole_proj)) > r * 0.99 {
        return mt_end;
    }

    let r1 = orient * Vec3::new(0.0, 0.0, -r);
    let r2 = orient * Vec3::new(r, 0.0, 0.0);
    let (p1, p2) = if (pole_proj - chr_pos).norm() < r * 1.01 {
        // pole inside the kinetochore circle, no tangents
        (chr_pos + r1, chr_pos - r1)
    } else {
        let cv = chr_pos - pole_proj;
        let cl = cv.norm();
        let bl = r * cl / (cl * cl - r * r).sqrt();
        let bv = cv.normalize().cross(&ort_z) * bl;
        let nd1 = (cv + bv).normalize();
        let nd2 = (cv - bv).normalize();
        let mut p1 = nd1 * nd1.dot(&cv) + pole_proj;
        let mut p2 = nd2 * nd2.dot(&cv) + pole_proj;
        let pole_side = (pole_proj - chr_pos).dot(&r2) > 0.0;
        if (p1 - chr_pos).dot(&r2) < 0.0 {
            p1 = chr_pos + if pole_side { r1 } else { -r1 };
        }
        if (p2 - chr_pos).dot(&r2) < 0.0 {
            p2 = chr_pos + if pole_side { -r1 } else { r1 };
        }
        (p1, p2)
    };

    let path = |p: &Vec3| {
        let arc = geom.arc_length(&chr_pos, r, &mt_end_proj, p);
        let arc = arc.min(PI * r - arc + 2.0 * r);
        (p - pole_proj).norm() + arc
    };
    let mut force_point = if path(&p1) < path(&p2) { p1 } else { p2 };

    // Lift the projected point back to the height of the MT
    let mut my_ort = mt_end_proj - pole_proj;
    let pole_mt_x = my_ort.norm();
    my_ort /= pole_mt_x;
    let height_eps = c.cr_kin_l * 1e-3;
    let mut y_mult = pole_mt_x;
    if y_mult.abs() < height_eps {
        y_mult = if y_mult >= 0.0 { height_eps } else { -height_eps };
    }
    y_mult = (mt_end - pole).dot(&ort_z) / y_mult;

    let mut height = (mt_end_proj - force_point).dot(&my_ort);
    height *= if pole_mt_x * height > 0.0 { -y_mult } else { y_mult };
    height += (mt_end - chr_pos).dot(&ort_z);
    height = height.clamp(-c.cr_kin_l / 2.0, c.cr_kin_l / 2.0);
    force_point += ort_z * height;
    force_point
}

/// Adds the pull of one bound MT to the motion system.
fn add_mt_force(mat: &mut MotionSystem, c: &StepConstants, chr_pos: Vec3, beg: Vec3, end: Vec3) {
    let r = end - chr_pos;
    let big_r = (beg - end).normalize();
    let r_r = r.cross(&big_r);
    for i in 0..3 {
        for j in 0..3 {
            mat[2 * i][2 * j] -= big_r[i] * big_r[j] * c.const_b;
            mat[2 * i][2 * j + 1] -= big_r[i] * r_r[j] * c.const_b;
        }
        mat[2 * i][6] -= big_r[i] * c.const_a;
        for j in 0..3 {
            mat[2 * i + 1][2 * j] -= r_r[i] * big_r[j] * c.const_b;
            mat[2 * i + 1][2 * j + 1] -= r_r[i] * r_r[j] * c.const_b;
        }
        mat[2 * i + 1][6] -= r_r[i] * c.const_a;
    }
}

/// Sum of the pulling forces of the bound MTs along the spring axes of both sisters.
fn spring_force(cell: &Cell, c: &StepConstants, kmts: &[Vec<usize>], crs: [usize; 2]) -> Real {
    let mut total = 0.0;
    for cr in crs {
        let chr = cell.chromosome_at(cr);
        let pos = chr.position();
        let orient = chr.orientation();
        let cr_axis = unit_y(&orient);
        let spring_axis = unit_x(&orient);
        for &id in &kmts[cr] {
            let mt = cell.mt_at(id);
            let beg = mt.pole().position();
            let end = beg + mt.direction() * mt.length();
            let r = end - pos;
            let big_r = (beg - end).normalize();
            let end_prj = pos + cr_axis * r.dot(&cr_axis);
            let norm_axis = (end_prj - end).normalize();
            let k = if big_r.dot(&norm_axis) <= 0.0 {
                big_r
            } else {
                let k = big_r - norm_axis * big_r.dot(&norm_axis);
                if k.norm() > 1e-8 {
                    k.normalize()
                } else {
                    Vec3::zeros()
                }
            };
            total += (k * c.const_a).dot(&spring_axis);
        }
    }
    total
}

/// Re-centers both sisters around their midpoint at the current spring length.
fn update_spring(cell: &mut Cell, c: &StepConstants, kmts: &[Vec<usize>], crs: [usize; 2]) {
    let pos0 = cell.chromosome_at(crs[0]).position();
    let pos1 = cell.chromosome_at(crs[1]).position();
    let center = (pos0 + pos1) / 2.0;
    let prev_len = (pos0 - pos1).norm();
    let new_len = if c.moving_spring {
        let total = spring_force(cell, c, kmts, crs);
        if total < 0.0 {
            0.0
        } else {
            c.spring_length + (total / 2.0) / c.spring_k
        }
    } else {
        c.spring_length
    };

    for cr in crs {
        let spring_axis = unit_x(&cell.chromosome_at(cr).orientation());
        cell.chromosome_at_mut(cr)
            .set_position(&(center + spring_axis * (new_len / 2.0)));
        for &id in &kmts[cr] {
            let beg = cell.mt_at(id).pole().position();
            let mut mt = cell.mt_at_mut(id);
            let mut end = beg + mt.direction() * mt.length();
            end -= spring_axis * (prev_len / 2.0);
            end += spring_axis * (new_len / 2.0);
            mt.set_direction(&(end - beg).normalize());
            mt.set_length((end - beg).norm());
        }
    }
}

fn normal_vec(rng: &mut Generator, sigma: Real) -> Vec3 {
    let x = rng.next_standard_normal() as Real;
    let y = rng.next_standard_normal() as Real;
    let z = rng.next_standard_normal() as Real;
    Vec3::new(x * sigma, y * sigma, z * sigma)
}

/// Moves one chromosome, or one pair while the springs are intact, as a rigid body.
#[allow(clippy::too_many_arguments)]
fn step_unit(
    cell: &mut Cell,
    rng: &mut Generator,
    c: &StepConstants,
    geom: &Geometry,
    kmts: &[Vec<usize>],
    crs: [usize; 2],
    broken: bool,
) {
    let members = if broken { &crs[..1] } else { &crs[..] };

    let mut mat: MotionSystem = [[0.0; 7]; 6];
    for i in 0..3 {
        mat[2 * i][2 * i] = -c.gamma;
        mat[2 * i + 1][2 * i + 1] = -c.ieta;
    }
    let move_flag = if broken {
        !kmts[crs[0]].is_empty()
    } else {
        !c.frozen_coords && (!kmts[crs[0]].is_empty() || !kmts[crs[1]].is_empty())
    };

    for &cr in members {
        let (chr_pos, orient) = {
            let chr = cell.chromosome_at(cr);
            (chr.position(), chr.orientation())
        };
        for &id in &kmts[cr] {
            let (pole, mt_end) = {
                let mt = cell.mt_at(id);
                (mt.pole().position(), mt.end_point())
            };
            let offset = if c.mt_wrapping {
                wrapped_force_point(geom, c, chr_pos, &orient, pole, mt_end) - mt_end
            } else {
                Vec3::zeros()
            };
            cell.mt_at_mut(id).set_force_offset(&offset);
            add_mt_force(&mut mat, c, chr_pos, pole, mt_end + offset);
        }
    }

    let mut v = Vec3::zeros();
    let mut w = Vec3::zeros();
    if let Some(x) = solve_motion_system(&mut mat) {
        w = Vec3::new(x[1], x[3], x[5]);
        if move_flag {
            v = Vec3::new(x[0], x[2], x[4]);
            if !broken {
                // pairs may not move along the pole-pole axis
                let (left, right) = cell.pole_positions();
                let dir = left - right;
                let dir_len = dir.norm();
                v = if dir_len > c.r_cell * 1e-5 {
                    v - dir * v.dot(&(dir / dir_len)) / dir_len
                } else {
                    Vec3::zeros()
                };
            }
        }
    }

    if !broken {
        update_spring(cell, c, kmts, crs);
    }

    let trans_add = normal_vec(rng, (2.0 * c.d_trans * c.dt).sqrt());
    let rot_add = normal_vec(rng, (2.0 * c.d_rot * c.dt).sqrt());
    let trans = v * c.dt + trans_add;
    let angles = w * c.dt + rot_add;
    let rotate = rotation_xyz(angles.x, angles.y, angles.z);

    let mut rotate_point =
        (cell.chromosome_at(crs[0]).position() + cell.chromosome_at(crs[1]).position()) / 2.0;
    for &cr in members {
        let (prev_pos, prev_orient) = {
            let chr = cell.chromosome_at(cr);
            (chr.position(), chr.orientation())
        };
        if broken {
            rotate_point = prev_pos;
        }
        let pos = rotate_point + (rotate * (prev_pos - rotate_point) + trans);
        let orient = rotate * prev_orient;
        {
            let mut chr = cell.chromosome_at_mut(cr);
            chr.set_position(&pos);
            chr.set_orientation(&orient);
        }

        let ort = unit_y(&orient);
        let spring_offset = pos - (rotate_point + trans);
        for &id in &kmts[cr] {
            let beg = cell.mt_at(id).pole().position();
            let mut mt = cell.mt_at_mut(id);
            let end = beg + mt.direction() * mt.length();
            let mut r = rotate * (end - rotate_point);
            let height = r.dot(&ort);
            r = (r - spring_offset - ort * height).normalize() * c.cr_kin_r;
            r += spring_offset + ort * height.clamp(-c.cr_kin_l / 2.0, c.cr_kin_l / 2.0);
            let end = rotate_point + r + trans;
            mt.set_direction(&(end - beg).normalize());
            mt.set_length((end - beg).norm());
        }
    }
}

/// Force balance and Langevin motion of every chromosome.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub(crate) fn macro_step(cell: &mut Cell, rng: &mut Generator, c: &StepConstants) {
    let kmts = CellOps::extract_kmts(cell.data());
    let geom = Geometry::new(c.geometry_epsilon());
    let broken = cell.are_springs_broken();
    let stride = if broken { 1 } else { 2 };
    let mut cri = 0;
    while cri < cell.chromosome_count() {
        step_unit(cell, rng, c, &geom, &kmts, [cri, cri ^ 1], broken);
        cri += stride;
    }
}

#[cfg(test)]
mod test_macro_step {
    use super::*;
    use crate::cell::CellObjectProvider;
    use micosi_concepts::{rotation_y, Access, DoubleParam, IntParam, SimParams};

    fn constants(setup: impl FnOnce(&mut SimParams)) -> StepConstants {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        params.set_double(DoubleParam::DTrans, 0.0).unwrap();
        params.set_double(DoubleParam::DRot, 0.0).unwrap();
        params.set_double(DoubleParam::SpringLength, 1.0).unwrap();
        setup(&mut params);
        StepConstants::new(&params)
    }

    /// One pair on the x axis, sister 0 facing the left pole, MT 0 bound to sister 0.
    fn bound_pair() -> Cell {
        let mut cell = Cell::new(1, 1);
        cell.set_pole_positions(Vec3::new(-5e-6, 0.0, 0.0), Vec3::new(5e-6, 0.0, 0.0));
        cell.reset_orientations();
        {
            let mut chr = cell.chromosome_mut(0).unwrap();
            chr.set_position(&Vec3::new(-0.5e-6, 0.0, 0.0));
            chr.set_orientation(&rotation_y(PI));
        }
        cell.chromosome_mut(1)
            .unwrap()
            .set_position(&Vec3::new(0.5e-6, 0.0, 0.0));
        let mut mt = cell.mt_mut(0).unwrap();
        mt.set_direction(&Vec3::new(1.0, 0.0, 0.0));
        mt.set_length(4.35e-6);
        mt.set_bound_chromosome(Some(0));
        cell
    }

    fn center(cell: &Cell) -> Vec3 {
        (cell.chromosome(0).unwrap().position() + cell.chromosome(1).unwrap().position()) / 2.0
    }

    #[test]
    fn frozen_pair_keeps_its_center() {
        let c = constants(|p| p.set_int(IntParam::FrozenCoords, 1).unwrap());
        let mut cell = bound_pair();
        cell.chromosome_mut(1)
            .unwrap()
            .set_position(&Vec3::new(0.5e-6, 0.3e-6, 0.0));
        let before = center(&cell);
        let mut rng = Generator::from_seed_u32(2);
        for _ in 0..10 {
            macro_step(&mut cell, &mut rng, &c);
        }
        approx::assert_abs_diff_eq!(center(&cell), before, epsilon = 1e-10);
    }

    #[test]
    fn pair_does_not_move_along_the_pole_axis() {
        let c = constants(|p| p.set_int(IntParam::MtWrapping, 0).unwrap());
        let mut cell = bound_pair();
        let before = center(&cell);
        let mut rng = Generator::from_seed_u32(2);
        macro_step(&mut cell, &mut rng, &c);
        approx::assert_abs_diff_eq!(center(&cell).x, before.x, epsilon = 1e-12);
        // the rigid spring keeps the sisters one spring length apart
        approx::assert_relative_eq!(cell.spring(0).unwrap().length(), 1e-6, max_relative = 1e-4);
    }

    #[test]
    fn single_chromosome_is_pulled_towards_the_pole() {
        let c = constants(|p| p.set_int(IntParam::MtWrapping, 0).unwrap());
        let mut cell = bound_pair();
        cell.break_springs();
        let before = cell.chromosome(0).unwrap().position();
        let other = cell.chromosome(1).unwrap().position();
        let end_before = cell.mt(0).unwrap().end_point();
        let mut rng = Generator::from_seed_u32(2);
        macro_step(&mut cell, &mut rng, &c);

        let after = cell.chromosome(0).unwrap().position();
        assert!(after.x < before.x);
        assert_eq!(cell.chromosome(1).unwrap().position(), other);
        // the MT end follows the kinetochore
        let shift = after - before;
        approx::assert_abs_diff_eq!(
            cell.mt(0).unwrap().end_point(),
            end_before + shift,
            epsilon = 1e-10
        );
    }

    #[test]
    fn chromosomes_without_mts_stay_still() {
        let c = constants(|_| {});
        let mut cell = bound_pair();
        cell.mt_mut(0).unwrap().set_bound_chromosome(None);
        cell.break_springs();
        let before: Vec<_> = cell.chromosomes().map(|c| c.position()).collect();
        let mut rng = Generator::from_seed_u32(2);
        macro_step(&mut cell, &mut rng, &c);
        let after: Vec<_> = cell.chromosomes().map(|c| c.position()).collect();
        for (a, b) in before.iter().zip(after.iter()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn moving_spring_stretches_under_load() {
        let c = constants(|p| {
            p.set_int(IntParam::SpringType, 1).unwrap();
            p.set_int(IntParam::MtWrapping, 0).unwrap();
        });
        let mut cell = bound_pair();
        // a second MT on the right sister pulls the other way
        cell.reset_orientations();
        cell.chromosome_mut(0)
            .unwrap()
            .set_orientation(&rotation_y(PI));
        {
            let mut mt = cell.mt_mut(1).unwrap();
            mt.set_direction(&Vec3::new(-1.0, 0.0, 0.0));
            mt.set_length(4.35e-6);
            mt.set_bound_chromosome(Some(1));
        }
        let mut rng = Generator::from_seed_u32(2);
        macro_step(&mut cell, &mut rng, &c);
        assert!(cell.spring(0).unwrap().length() > 1e-6);
    }
}
