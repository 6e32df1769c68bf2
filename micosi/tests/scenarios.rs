mod common;

use common::{params, read_layers};
use micosi::launch::{Setup, Simulation};
use micosi::prelude::*;

/// One chromosome pair at the center with both kinetochores facing the MT of their pole.
struct FacingPoles;

impl CellInitializer for FacingPoles {
    fn cell_config(&self) -> (usize, usize) {
        (1, 1)
    }

    fn initialize_cell(&self, cell: &mut Cell, _: &mut Generator) -> Result<(), SetupError> {
        cell.set_pole_positions(Vec3::new(-5e-6, 0.0, 0.0), Vec3::new(5e-6, 0.0, 0.0));
        cell.reset_orientations();
        cell.chromosome_mut(0)
            .ok_or(SetupError("missing chromosome".into()))?
            .set_orientation(&rotation_y(PI));
        for (id, dx) in [(0, 1.0), (1, -1.0)] {
            let mut mt = cell.mt_mut(id).ok_or(SetupError("missing MT".into()))?;
            mt.set_direction(&Vec3::new(dx, 0.0, 0.0));
            mt.set_length(4.5e-6);
            mt.set_state(MtState::Polymerization);
        }
        Ok(())
    }
}

#[test]
fn facing_mts_bind_and_stay_bound() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binding.cell");
    let params = params(|p| {
        p.set_double(DoubleParam::KOn, 100.0).unwrap();
        p.set_double(DoubleParam::KOff, 0.0).unwrap();
        p.set_double(DoubleParam::FCat, 0.0).unwrap();
        p.set_double(DoubleParam::DTrans, 0.0).unwrap();
        p.set_double(DoubleParam::DRot, 0.0).unwrap();
        p.set_double(DoubleParam::TEnd, 5.0).unwrap();
        p.set_double(DoubleParam::SaveFreqMacro, 0.1).unwrap();
    });
    let setup = Setup {
        initializer: Some(&FacingPoles),
        updater: Some(Box::new(DeserializingPoleUpdater)),
        config: SimulatorConfig { threads: 1 },
    };
    let mut sim = Simulation::new(&path, 1, Some(4), params, setup).unwrap();
    sim.run_to_end(false).unwrap();
    let stats = sim.stats().unwrap()[0];
    assert_eq!(stats.mts().bound(), 2.0);
    assert_eq!(stats.min_bound_per_chromosome(), Some(1));
    drop(sim);

    let layers = read_layers(&path);
    assert_eq!(layers.len(), 51);
    let bound = |cell: &Cell| {
        [0, 1].map(|id| cell.mt(id).and_then(|mt| mt.bound_chromosome_id()))
    };
    let first = layers
        .iter()
        .position(|(_, cell, _)| bound(cell) == [Some(0), Some(1)])
        .unwrap();
    assert!(first > 0);
    assert!(layers[first..]
        .iter()
        .all(|(_, cell, _)| bound(cell) == [Some(0), Some(1)]));
    assert!(layers[..first]
        .iter()
        .all(|(_, cell, _)| bound(cell) == [None, None]));
}

#[test]
fn frozen_pairs_without_mts_stay_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frozen.cell");
    let params = params(|p| {
        p.set_int(IntParam::NCrTotal, 3).unwrap();
        p.set_int(IntParam::NMtTotal, 0).unwrap();
        p.set_int(IntParam::FrozenCoords, 1).unwrap();
        p.set_double(DoubleParam::DTrans, 0.0).unwrap();
        p.set_double(DoubleParam::DRot, 0.0).unwrap();
        p.set_double(DoubleParam::TEnd, 1.0).unwrap();
    });
    let mut sim = Simulation::new(&path, 1, Some(12), params, Setup::default()).unwrap();
    let centers = |sim: &Simulation| {
        sim.cells()[0]
            .cell
            .chromosome_pairs()
            .map(|pair| (pair.left().position() + pair.right().position()) / 2.0)
            .collect::<Vec<_>>()
    };
    let before = centers(&sim);
    sim.run_to_end(false).unwrap();
    for (a, b) in before.iter().zip(centers(&sim).iter()) {
        approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn broken_springs_stay_broken() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("springs.cell");
    let params = params(|p| {
        p.set_int(IntParam::NCrTotal, 2).unwrap();
        p.set_int(IntParam::NMtTotal, 10).unwrap();
        p.set_int(IntParam::SpringBrakeType, 1).unwrap();
        p.set_int(IntParam::SpringBrakeMts, 0).unwrap();
        p.set_double(DoubleParam::TEnd, 1.0).unwrap();
    });
    let mut sim = Simulation::new(&path, 1, Some(6), params, Setup::default()).unwrap();
    sim.run_to_end(false).unwrap();
    drop(sim);

    let layers = read_layers(&path);
    assert!(!layers[0].1.are_springs_broken());
    assert!(layers[1..].iter().all(|(_, cell, _)| cell.are_springs_broken()));
    assert!(layers[1..].iter().all(|(_, cell, _)| cell.springs().is_empty()));
}

#[test]
fn unreachable_criterion_keeps_springs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("springs.cell");
    let params = params(|p| {
        p.set_int(IntParam::NCrTotal, 1).unwrap();
        p.set_int(IntParam::NMtTotal, 4).unwrap();
        p.set_int(IntParam::SpringBrakeType, 1).unwrap();
        p.set_int(IntParam::SpringBrakeMts, 1000).unwrap();
        p.set_double(DoubleParam::TEnd, 1.0).unwrap();
    });
    let mut sim = Simulation::new(&path, 1, Some(6), params, Setup::default()).unwrap();
    sim.run_to_end(false).unwrap();
    assert!(!sim.cells()[0].cell.are_springs_broken());
}
