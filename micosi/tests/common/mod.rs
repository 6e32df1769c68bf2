#![allow(dead_code)]
use std::path::Path;

use micosi::prelude::*;

pub fn params(setup: impl FnOnce(&mut SimParams)) -> SimParams {
    let mut params = SimParams::new();
    params.set_access(Access::Initialize);
    setup(&mut params);
    params.set_access(Access::Update);
    params
}

pub fn small_cell(t_end: f64, save_freq: f64) -> SimParams {
    params(|p| {
        p.set_int(IntParam::NCrTotal, 2).unwrap();
        p.set_int(IntParam::NMtTotal, 20).unwrap();
        p.set_double(DoubleParam::TEnd, t_end).unwrap();
        p.set_double(DoubleParam::SaveFreqMacro, save_freq).unwrap();
    })
}

/// Stored layer as (time, cell, serialized generator).
pub type Layer = (f64, Cell, String);

pub fn read_layers(path: &Path) -> Vec<Layer> {
    let mut stream = TimeStream::open(path).unwrap();
    let mut layers = Vec::new();
    while stream.move_next().unwrap() {
        let layer = stream.current().unwrap();
        layers.push((layer.time, layer.cell.clone(), layer.rng.serialize_state()));
    }
    layers
}
