mod common;

use common::{read_layers, small_cell};
use micosi::launch::{cell_file_names, Setup, Simulation};
use micosi::prelude::*;

#[test]
fn same_seed_same_files() {
    let dir = tempfile::tempdir().unwrap();
    let run = |name: &str| {
        let path = dir.path().join(name);
        let mut sim = Simulation::new(&path, 2, Some(17), small_cell(1.0, 0.2), Setup::default())
            .unwrap();
        sim.run_to_end(false).unwrap();
        let cells = sim.finish().unwrap();
        let layers: Vec<_> = cell_file_names(&path, 2)
            .iter()
            .map(|file| read_layers(file))
            .collect();
        (cells, layers)
    };
    let (cells_a, layers_a) = run("a.cell");
    let (cells_b, layers_b) = run("b.cell");
    for (a, b) in cells_a.iter().zip(cells_b.iter()) {
        assert_eq!(a.cell, b.cell);
        assert_eq!(a.rng.serialize_state(), b.rng.serialize_state());
    }
    assert_eq!(layers_a, layers_b);
    assert_eq!(layers_a[0].len(), 6);
    assert_ne!(layers_a[0][5].1, layers_a[1][5].1);
}

#[test]
fn restart_reproduces_new() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cell.cell");
    let mut sim =
        Simulation::new(&path, 1, Some(3), small_cell(1.0, 0.5), Setup::default()).unwrap();
    sim.run_to_end(false).unwrap();
    drop(sim);
    let original = read_layers(&path);

    let mut sim =
        Simulation::restart(&path, 1, small_cell(1.0, 0.5), Setup::default()).unwrap();
    sim.run_to_end(false).unwrap();
    drop(sim);
    assert_eq!(read_layers(&path), original);
}

#[test]
fn continuing_in_steps_reproduces_one_run() {
    let dir = tempfile::tempdir().unwrap();
    let whole = dir.path().join("whole.cell");
    let parts = dir.path().join("parts.cell");

    let mut sim =
        Simulation::new(&whole, 2, Some(5), small_cell(2.0, 0.5), Setup::default()).unwrap();
    sim.run_to_end(false).unwrap();
    drop(sim);

    let mut sim =
        Simulation::new(&parts, 2, Some(5), small_cell(1.0, 0.5), Setup::default()).unwrap();
    sim.run_to_end(false).unwrap();
    drop(sim);
    for t_end in ["1.5", "2"] {
        let props = format!("# extend the run\nt_end = {t_end}\n");
        let mut sim = Simulation::resume(&parts, 2, Some(&props), Setup::default()).unwrap();
        sim.run_to_end(false).unwrap();
    }

    for (w, p) in cell_file_names(&whole, 2)
        .iter()
        .zip(cell_file_names(&parts, 2).iter())
    {
        let whole = read_layers(w);
        assert_eq!(whole.len(), 5);
        assert_eq!(whole, read_layers(p));
    }
    let mut stream = TimeStream::open(cell_file_names(&parts, 2)[0].as_path()).unwrap();
    assert_eq!(stream.params().unwrap().len(), 3);
    stream.move_to(4).unwrap();
    assert_eq!(
        stream.current().unwrap().params.get_double(DoubleParam::TEnd),
        2.0
    );
}

#[test]
fn constants_cannot_change_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cell.cell");
    let mut sim =
        Simulation::new(&path, 1, Some(1), small_cell(0.5, 0.5), Setup::default()).unwrap();
    sim.run_to_end(false).unwrap();
    drop(sim);
    let result = Simulation::resume(&path, 1, Some("r_cell=9"), Setup::default());
    assert!(matches!(result, Err(SimulationError::ParamsError(_))));
    // the failed attempt released its locks
    assert!(Simulation::resume(&path, 1, Some("t_end=1"), Setup::default()).is_ok());
}
