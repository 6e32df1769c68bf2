//! XML metadata and binary payloads of the records in a stored simulation.
//!
//! Floating point scalars in metadata are split into the two 32 bit halves of their
//! IEEE representation (`t0`/`t1`, `LPX0`/`LPX1`, ...) so that no precision is lost in
//! text form. Arrays live in the binary payload and are referenced as `"offset:size"` in bytes,
//! `"-1:0"` marks an empty array.

use bytemuck::Pod;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use micosi_concepts::{
    default_direct, Access, DoubleParam, Generator, IntParam, Mat3, RandomEngine, Real,
    SimParams, Vec3,
};

use super::explorer::ChunkElement;
use crate::cell::{Cell, CellArray, MtState};
use crate::errors::StorageError;

/// Splits a double into its low and high 32 bit halves.
pub fn split_f64(value: f64) -> (i32, i32) {
    let bits = value.to_bits();
    (bits as u32 as i32, (bits >> 32) as u32 as i32)
}

/// Inverse of [split_f64].
pub fn join_f64(low: i32, high: i32) -> f64 {
    f64::from_bits((low as u32 as u64) | ((high as u32 as u64) << 32))
}

fn format_error(message: impl Into<String>) -> StorageError {
    StorageError::FormatError(message.into())
}

#[derive(Default)]
struct PayloadWriter {
    bin: Vec<u8>,
}

impl PayloadWriter {
    fn push<T: Pod>(&mut self, values: &[T]) -> String {
        if values.is_empty() {
            return "-1:0".to_owned();
        }
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytemuck::cast_slice(values));
        format!("{offset}:{}", self.bin.len() - offset)
    }
}

fn read_array<T: Pod>(bin: &[u8], reference: &str) -> Result<Vec<T>, StorageError> {
    let (offset, size) = reference
        .split_once(':')
        .ok_or_else(|| format_error(format!("cannot find delimiter in \"{reference}\"")))?;
    let offset: i64 = offset.trim().parse()?;
    let size: i64 = size.trim().parse()?;
    if offset < 0 || size <= 0 {
        return Ok(Vec::new());
    }
    let (offset, size) = (offset as usize, size as usize);
    let width = core::mem::size_of::<T>();
    let bytes = offset
        .checked_add(size)
        .and_then(|end| bin.get(offset..end))
        .filter(|bytes| bytes.len() % width == 0)
        .ok_or_else(|| format_error(format!("cannot load array \"{reference}\"")))?;
    Ok(bytes
        .chunks_exact(width)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename = "Configuration")]
struct ConfigurationXml {
    #[serde(rename = "Parameters")]
    parameters: ConfigurationParametersXml,
    /// Required section for static MT information, always empty.
    #[serde(rename = "MTs")]
    mts: ConfigurationMtsXml,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigurationMtsXml {}

#[derive(Debug, Deserialize, Serialize)]
struct ConfigurationParametersXml {
    #[serde(rename = "@rng_seed")]
    rng_seed: i64,
    #[serde(rename = "@rng_state")]
    rng_state: String,
    #[serde(rename = "@n_mt_total")]
    n_mt_total: usize,
    #[serde(rename = "@n_cr_total")]
    n_cr_total: usize,
}

/// Shape of the stored cell and the generator it started with.
#[derive(Clone, Debug)]
pub struct CellConfiguration {
    /// Number of chromosome pairs
    pub chr_pairs: usize,
    /// Number of MTs on each pole
    pub mts_per_pole: usize,
    /// Generator state before the first iteration
    pub rng: Generator,
    /// Seed given by the user, `-1` if the generator was seeded from the clock
    pub seed: i64,
}

impl CellConfiguration {
    /// Cell of the stored shape to be overwritten by a time layer.
    ///
    /// MTs point along [default_direct] and chromosomes are unrotated.
    pub fn blank_cell(&self) -> Cell {
        let mut cell = Cell::new(self.chr_pairs, self.mts_per_pole);
        cell.reset_orientations();
        let direct = default_direct();
        for id in 0..cell.mt_count() {
            cell.mt_at_mut(id).set_direction(&direct);
        }
        cell
    }
}

/// Encodes the configuration record of a new file.
pub fn encode_configuration(
    cell: &Cell,
    rng: &Generator,
    seed: i64,
) -> Result<ChunkElement, StorageError> {
    let config = ConfigurationXml {
        parameters: ConfigurationParametersXml {
            rng_seed: seed,
            rng_state: rng.serialize_state(),
            n_mt_total: cell.mt_count(),
            n_cr_total: cell.chromosome_count(),
        },
        mts: ConfigurationMtsXml::default(),
    };
    Ok(ChunkElement {
        xml: quick_xml::se::to_string(&config)?,
        bin: Vec::new(),
    })
}

/// Decodes a configuration record.
pub fn decode_configuration(element: &ChunkElement) -> Result<CellConfiguration, StorageError> {
    let config: ConfigurationXml = quick_xml::de::from_str(&element.xml)?;
    let params = config.parameters;
    if params.n_mt_total % 2 != 0 || params.n_cr_total % 2 != 0 {
        return Err(format_error(format!(
            "odd number of MTs ({}) or chromosomes ({})",
            params.n_mt_total, params.n_cr_total
        )));
    }
    Ok(CellConfiguration {
        chr_pairs: params.n_cr_total / 2,
        mts_per_pole: params.n_mt_total / 2,
        rng: Generator::deserialize_state(&params.rng_state)?,
        seed: params.rng_seed,
    })
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename = "Time_layer")]
struct TimeLayerXml {
    #[serde(rename = "@t0")]
    t0: i32,
    #[serde(rename = "@t1")]
    t1: i32,
    #[serde(rename = "@rand")]
    rand: String,
    #[serde(rename = "Cell")]
    cell: CellXml,
    #[serde(rename = "MTs")]
    mts: MtsXml,
    #[serde(rename = "Chrms")]
    chromosomes: ChromosomesXml,
}

#[derive(Debug, Deserialize)]
struct TimeXml {
    #[serde(rename = "@t0")]
    t0: i32,
    #[serde(rename = "@t1")]
    t1: i32,
}

#[derive(Debug, Deserialize, Serialize)]
struct CellXml {
    #[serde(rename = "@LPX0")]
    lpx0: i32,
    #[serde(rename = "@LPX1")]
    lpx1: i32,
    #[serde(rename = "@LPY0")]
    lpy0: i32,
    #[serde(rename = "@LPY1")]
    lpy1: i32,
    #[serde(rename = "@LPZ0")]
    lpz0: i32,
    #[serde(rename = "@LPZ1")]
    lpz1: i32,
    #[serde(rename = "@RPX0")]
    rpx0: i32,
    #[serde(rename = "@RPX1")]
    rpx1: i32,
    #[serde(rename = "@RPY0")]
    rpy0: i32,
    #[serde(rename = "@RPY1")]
    rpy1: i32,
    #[serde(rename = "@RPZ0")]
    rpz0: i32,
    #[serde(rename = "@RPZ1")]
    rpz1: i32,
    #[serde(rename = "@SprBrkn")]
    springs_broken: i32,
}

impl CellXml {
    fn new(left: &Vec3, right: &Vec3, springs_broken: bool) -> Self {
        let [lx, ly, lz] = [left.x, left.y, left.z].map(|v| split_f64(v as f64));
        let [rx, ry, rz] = [right.x, right.y, right.z].map(|v| split_f64(v as f64));
        Self {
            lpx0: lx.0,
            lpx1: lx.1,
            lpy0: ly.0,
            lpy1: ly.1,
            lpz0: lz.0,
            lpz1: lz.1,
            rpx0: rx.0,
            rpx1: rx.1,
            rpy0: ry.0,
            rpy1: ry.1,
            rpz0: rz.0,
            rpz1: rz.1,
            springs_broken: springs_broken as i32,
        }
    }

    fn poles(&self) -> (Vec3, Vec3) {
        let v = |low, high| join_f64(low, high) as Real;
        (
            Vec3::new(v(self.lpx0, self.lpx1), v(self.lpy0, self.lpy1), v(self.lpz0, self.lpz1)),
            Vec3::new(v(self.rpx0, self.rpx1), v(self.rpy0, self.rpy1), v(self.rpz0, self.rpz1)),
        )
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct MtsXml {
    #[serde(rename = "@Len")]
    length: String,
    #[serde(rename = "@DX")]
    direction_x: String,
    #[serde(rename = "@DY")]
    direction_y: String,
    #[serde(rename = "@DZ")]
    direction_z: String,
    #[serde(rename = "@FX")]
    force_x: String,
    #[serde(rename = "@FY")]
    force_y: String,
    #[serde(rename = "@FZ")]
    force_z: String,
    #[serde(rename = "@St")]
    state: String,
    #[serde(rename = "@Bnd")]
    bound: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct ChromosomesXml {
    #[serde(rename = "@X")]
    x: String,
    #[serde(rename = "@Y")]
    y: String,
    #[serde(rename = "@Z")]
    z: String,
    #[serde(rename = "@Mat")]
    orientation: String,
}

fn checked_time(t0: i32, t1: i32) -> Result<f64, StorageError> {
    let time = join_f64(t0, t1);
    if time.is_nan() || time < 0.0 {
        return Err(format_error(format!("unexpected value of time record: {time}")));
    }
    Ok(time)
}

/// Encodes the state of `cell` at `time` together with the generator state.
pub fn encode_time_layer(
    cell: &Cell,
    time: f64,
    rng: &Generator,
) -> Result<ChunkElement, StorageError> {
    let data = cell.data();
    let mut payload = PayloadWriter::default();
    let (left, right) = cell.pole_positions();
    let (t0, t1) = split_f64(time);

    let states: Vec<i32> = data
        .array::<u32>(CellArray::MtState)
        .iter()
        .map(|&s| s as i32)
        .collect();
    let bound: Vec<i32> = data
        .array::<i32>(CellArray::MtBoundChromosome)
        .iter()
        .map(|&b| b.max(-1))
        .collect();
    let mts = MtsXml {
        length: payload.push(data.array::<Real>(CellArray::MtLength)),
        direction_x: payload.push(data.array::<Real>(CellArray::MtDirectionX)),
        direction_y: payload.push(data.array::<Real>(CellArray::MtDirectionY)),
        direction_z: payload.push(data.array::<Real>(CellArray::MtDirectionZ)),
        force_x: payload.push(data.array::<Real>(CellArray::MtForceOffsetX)),
        force_y: payload.push(data.array::<Real>(CellArray::MtForceOffsetY)),
        force_z: payload.push(data.array::<Real>(CellArray::MtForceOffsetZ)),
        state: payload.push(&states),
        bound: payload.push(&bound),
    };

    let positions = data.array::<Real>(CellArray::ChrPosition);
    let axis = |k: usize| -> Vec<Real> { positions.iter().skip(k).step_by(3).copied().collect() };
    let chromosomes = ChromosomesXml {
        x: payload.push(&axis(0)),
        y: payload.push(&axis(1)),
        z: payload.push(&axis(2)),
        orientation: payload.push(data.array::<Real>(CellArray::ChrOrientation)),
    };

    let layer = TimeLayerXml {
        t0,
        t1,
        rand: rng.serialize_state(),
        cell: CellXml::new(&left, &right, cell.are_springs_broken()),
        mts,
        chromosomes,
    };
    Ok(ChunkElement {
        xml: quick_xml::se::to_string(&layer)?,
        bin: payload.bin,
    })
}

/// Time of a time layer record.
pub fn decode_time(element: &ChunkElement) -> Result<f64, StorageError> {
    let time: TimeXml = quick_xml::de::from_str(&element.xml)?;
    checked_time(time.t0, time.t1)
}

/// Overwrites `cell` with a stored time layer.
/// Returns the time and the generator state of the layer.
///
/// The cell has to have the stored shape. Nothing is written if the record is inconsistent.
pub fn decode_time_layer(
    element: &ChunkElement,
    cell: &mut Cell,
) -> Result<(f64, Generator), StorageError> {
    let layer: TimeLayerXml = quick_xml::de::from_str(&element.xml)?;
    let time = checked_time(layer.t0, layer.t1)?;
    let rng = Generator::deserialize_state(&layer.rand)?;
    let bin = &element.bin;

    let mts = &layer.mts;
    let length: Vec<Real> = read_array(bin, &mts.length)?;
    let dx: Vec<Real> = read_array(bin, &mts.direction_x)?;
    let dy: Vec<Real> = read_array(bin, &mts.direction_y)?;
    let dz: Vec<Real> = read_array(bin, &mts.direction_z)?;
    let fx: Vec<Real> = read_array(bin, &mts.force_x)?;
    let fy: Vec<Real> = read_array(bin, &mts.force_y)?;
    let fz: Vec<Real> = read_array(bin, &mts.force_z)?;
    let states: Vec<i32> = read_array(bin, &mts.state)?;
    let bound: Vec<i32> = read_array(bin, &mts.bound)?;
    let mt_count = cell.mt_count();
    let mt_arrays = [
        length.len(),
        dx.len(),
        dy.len(),
        dz.len(),
        fx.len(),
        fy.len(),
        fz.len(),
        states.len(),
        bound.len(),
    ];
    if mt_arrays.iter().any(|&n| n != mt_count) {
        return Err(format_error(
            "count of MTs differs in initial configuration and time layer",
        ));
    }
    let chr_count = cell.chromosome_count();
    if bound.iter().any(|&b| b >= 0 && b as usize >= chr_count) {
        return Err(format_error("wrong indices of the bound MTs"));
    }

    let chrs = &layer.chromosomes;
    let x: Vec<Real> = read_array(bin, &chrs.x)?;
    let y: Vec<Real> = read_array(bin, &chrs.y)?;
    let z: Vec<Real> = read_array(bin, &chrs.z)?;
    let orientation: Vec<Real> = read_array(bin, &chrs.orientation)?;
    if x.len() != chr_count
        || y.len() != chr_count
        || z.len() != chr_count
        || orientation.len() != 9 * chr_count
    {
        return Err(format_error(
            "count of chromosomes differs in initial configuration and time layer",
        ));
    }

    let (left, right) = layer.cell.poles();
    cell.set_springs_broken(layer.cell.springs_broken != 0);
    cell.set_pole_positions(left, right);
    for i in 0..mt_count {
        let mut mt = cell.mt_at_mut(i);
        mt.set_length(length[i]);
        mt.set_direction(&Vec3::new(dx[i], dy[i], dz[i]));
        mt.set_force_offset(&Vec3::new(fx[i], fy[i], fz[i]));
        mt.set_state(if states[i] == 0 {
            MtState::Polymerization
        } else {
            MtState::Depolymerization
        });
        mt.set_bound_chromosome(usize::try_from(bound[i]).ok());
    }
    for i in 0..chr_count {
        let mut chr = cell.chromosome_at_mut(i);
        chr.set_position(&Vec3::new(x[i], y[i], z[i]));
        chr.set_orientation(&Mat3::from_row_slice(&orientation[9 * i..9 * i + 9]));
    }
    Ok((time, rng))
}

const SIM_PARAMS_TAG: &str = "Sim_params";

/// Encodes a parameter record.
///
/// Integer parameters are stored by name, doubles in user units as `<name>0`/`<name>1` halves.
pub fn encode_sim_params(params: &SimParams) -> Result<ChunkElement, StorageError> {
    let mut start = BytesStart::new(SIM_PARAMS_TAG);
    for param in IntParam::ALL {
        let value = params.get_int(param).to_string();
        start.push_attribute((param.name(), value.as_str()));
    }
    for param in DoubleParam::ALL {
        let (low, high) = split_f64(params.get_double(param));
        let (low, high) = (low.to_string(), high.to_string());
        start.push_attribute((format!("{}0", param.name()).as_str(), low.as_str()));
        start.push_attribute((format!("{}1", param.name()).as_str(), high.as_str()));
    }
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Empty(start))?;
    let xml = String::from_utf8(writer.into_inner())
        .map_err(|e| format_error(format!("parameter record is not utf-8: {e}")))?;
    Ok(ChunkElement {
        xml,
        bin: Vec::new(),
    })
}

fn sim_params_attributes(xml: &str) -> Result<Vec<(String, String)>, StorageError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == SIM_PARAMS_TAG.as_bytes() => {
                return e
                    .attributes()
                    .map(|attr| {
                        let attr = attr?;
                        let key = std::str::from_utf8(attr.key.as_ref())
                            .map_err(|e| format_error(format!("bad attribute name: {e}")))?
                            .to_owned();
                        let value = String::from_utf8(attr.value.into_owned())
                            .map_err(|e| format_error(format!("bad attribute value: {e}")))?;
                        Ok((key, value))
                    })
                    .collect();
            }
            Event::Eof => return Err(format_error("cannot find simulation parameters")),
            _ => (),
        }
    }
}

/// Decodes a parameter record into a read-only registry.
pub fn decode_sim_params(element: &ChunkElement) -> Result<SimParams, StorageError> {
    let damaged = || format_error("damaged simulation parameters");
    let mut params = SimParams::new();
    params.set_access(Access::Initialize);
    let mut attributes = sim_params_attributes(&element.xml)?.into_iter();
    while let Some((name, value)) = attributes.next() {
        let double = name
            .strip_suffix('0')
            .and_then(|base| DoubleParam::parse(base).map(|param| (base, param)));
        match double {
            Some((base, param)) => {
                let (next_name, next_value) = attributes.next().ok_or_else(damaged)?;
                if next_name.strip_suffix('1') != Some(base) {
                    return Err(damaged());
                }
                let value = join_f64(value.trim().parse()?, next_value.trim().parse()?);
                params.set_double(param, value)?;
            }
            None => params.set_by_name(&name, &value, false)?,
        }
    }
    params.set_access(Access::ReadOnly);
    Ok(params)
}

#[cfg(test)]
mod test_codec {
    use super::*;
    use crate::cell::{CellObjectProvider, PoleType};
    use micosi_concepts::rotation_xyz;

    fn sample_cell() -> Cell {
        let mut cell = Cell::new(2, 3);
        cell.set_pole_positions(Vec3::new(-7e-6, 0.1e-6, 0.0), Vec3::new(7e-6, 0.0, -0.3e-6));
        for id in 0..cell.mt_count() {
            let mut mt = cell.mt_mut(id).unwrap();
            mt.set_direction(&Vec3::new(0.0, 1.0, 0.0));
            mt.set_length(id as Real * 1e-7);
            mt.set_force_offset(&Vec3::new(1e-9, 0.0, id as Real));
        }
        cell.mt_mut(1).unwrap().set_state(MtState::Depolymerization);
        cell.mt_mut(4).unwrap().set_bound_chromosome(Some(3));
        for id in 0..cell.chromosome_count() {
            let mut chr = cell.chromosome_mut(id).unwrap();
            chr.set_position(&Vec3::new(id as Real * 1e-6, 2e-6, -1e-6));
            chr.set_orientation(&rotation_xyz(0.1 * id as Real, 0.2, 0.3));
        }
        cell
    }

    #[test]
    fn halves_are_exact() {
        for value in [0.0, 0.1, -3.75e-6, f64::MAX, 1.0 / 3.0] {
            let (low, high) = split_f64(value);
            assert_eq!(join_f64(low, high).to_bits(), value.to_bits());
        }
    }

    #[test]
    fn time_layer_restores_cell() {
        let cell = sample_cell();
        let rng = Generator::from_seed_u32(99);
        let element = encode_time_layer(&cell, 12.3, &rng).unwrap();
        assert!(element.xml.starts_with("<Time_layer"));
        assert!(element.xml.contains("Len=\"0:"));

        let config = CellConfiguration {
            chr_pairs: 2,
            mts_per_pole: 3,
            rng: rng.clone(),
            seed: -1,
        };
        let mut restored = config.blank_cell();
        let (time, restored_rng) = decode_time_layer(&element, &mut restored).unwrap();
        assert_eq!(time, 12.3);
        assert_eq!(decode_time(&element).unwrap(), 12.3);
        assert_eq!(restored_rng.serialize_state(), rng.serialize_state());
        assert_eq!(restored, cell);
        assert_eq!(restored.pole(PoleType::Left).position(), cell.pole_positions().0);
        assert_eq!(
            restored.mt(4).unwrap().bound_chromosome_id(),
            Some(3)
        );
    }

    #[test]
    fn empty_cell_uses_empty_references() {
        let cell = Cell::new(0, 0);
        let element = encode_time_layer(&cell, 0.0, &Generator::from_seed_u32(1)).unwrap();
        assert!(element.xml.contains("Len=\"-1:0\""));
        assert!(element.xml.contains("Mat=\"-1:0\""));
        assert!(element.bin.is_empty());
        let mut restored = Cell::new(0, 0);
        assert!(decode_time_layer(&element, &mut restored).is_ok());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let cell = sample_cell();
        let element = encode_time_layer(&cell, 1.0, &Generator::from_seed_u32(1)).unwrap();
        let mut other = Cell::new(2, 4);
        let before = other.clone();
        assert!(matches!(
            decode_time_layer(&element, &mut other),
            Err(StorageError::FormatError(_))
        ));
        assert_eq!(other, before);
    }

    #[test]
    fn negative_time_is_rejected() {
        let cell = Cell::new(0, 1);
        let element = encode_time_layer(&cell, -1.0, &Generator::from_seed_u32(1)).unwrap();
        assert!(decode_time(&element).is_err());
        assert!(decode_time_layer(&element, &mut Cell::new(0, 1)).is_err());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let cell = sample_cell();
        let mut element = encode_time_layer(&cell, 1.0, &Generator::from_seed_u32(1)).unwrap();
        element.bin.truncate(element.bin.len() / 2);
        assert!(decode_time_layer(&element, &mut sample_cell()).is_err());
    }

    #[test]
    fn configuration_round_trip() {
        let cell = sample_cell();
        let rng = Generator::from_seed_u32(5);
        let element = encode_configuration(&cell, &rng, 5).unwrap();
        assert!(element.xml.contains("n_mt_total=\"6\""));
        let config = decode_configuration(&element).unwrap();
        assert_eq!((config.chr_pairs, config.mts_per_pole), (2, 3));
        assert_eq!(config.seed, 5);
        assert_eq!(config.rng.serialize_state(), rng.serialize_state());
        let blank = config.blank_cell();
        assert_eq!(blank.mt(0).unwrap().direction(), default_direct());
        assert_eq!(blank.chromosome(1).unwrap().orientation(), Mat3::identity());
    }

    #[test]
    fn configuration_requires_mts_section() {
        let element = encode_configuration(&sample_cell(), &Generator::from_seed_u32(5), 5).unwrap();
        let parameters = element.xml.find("<Parameters").unwrap();
        let mts = element.xml.find("<MTs").unwrap();
        assert!(parameters < mts);

        let without_mts = ChunkElement {
            xml: element.xml.replace("<MTs/>", "").replace("<MTs></MTs>", ""),
            bin: Vec::new(),
        };
        assert!(!without_mts.xml.contains("<MTs"));
        assert!(decode_configuration(&without_mts).is_err());
        assert_eq!(decode_configuration(&element).unwrap().seed, 5);
    }

    #[test]
    fn sim_params_keep_every_bit() {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        params.set_double(DoubleParam::Dt, 0.1 + 0.2).unwrap();
        params.set_double(DoubleParam::L1, 123.456).unwrap();
        params.set_int(IntParam::SpringType, 1).unwrap();
        params.set_access(Access::ReadOnly);

        let element = encode_sim_params(&params).unwrap();
        assert!(element.xml.starts_with("<Sim_params "));
        let decoded = decode_sim_params(&element).unwrap();
        assert_eq!(decoded.access(), Access::ReadOnly);
        assert_eq!(decoded.get_int(IntParam::SpringType), 1);
        assert_eq!(
            decoded.get_double(DoubleParam::Dt).to_bits(),
            (0.1f64 + 0.2).to_bits()
        );
        assert_eq!(decoded.get_double(DoubleParam::L1), 123.456);
        assert_eq!(decoded.export_values(), params.export_values());
    }

    #[test]
    fn damaged_sim_params() {
        let missing_high = ChunkElement {
            xml: "<Sim_params dt0=\"0\"/>".to_owned(),
            bin: Vec::new(),
        };
        assert!(decode_sim_params(&missing_high).is_err());
        let unknown = ChunkElement {
            xml: "<Sim_params nothing=\"1\"/>".to_owned(),
            bin: Vec::new(),
        };
        assert!(matches!(
            decode_sim_params(&unknown),
            Err(StorageError::ParamsError(_))
        ));
    }
}
