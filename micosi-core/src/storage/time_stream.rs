//! Sequential and random access to the stored history of one cell.

use std::path::{Path, PathBuf};

use micosi_concepts::{Generator, SimParams, VersionTag};

use super::codec::{
    decode_configuration, decode_sim_params, decode_time, decode_time_layer,
    encode_configuration, encode_sim_params, encode_time_layer, CellConfiguration,
};
use super::container::ChunkValidator;
use super::explorer::{parse_frame_chunk, parse_service_chunk, FileExplorer, DEFAULT_ELEMENTS_PER_CHUNK};
use super::lock::{lock_file, unlock_file};
use crate::cell::Cell;
use crate::errors::StorageError;

/// Snapshot at the current position of a [TimeStream].
#[derive(Clone, Copy, Debug)]
pub struct TimeLayer<'a> {
    /// Index of the layer
    pub index: usize,
    /// State of the cell
    pub cell: &'a Cell,
    /// Parameters the layer was computed with
    pub params: &'a SimParams,
    /// Model time
    pub time: f64,
    /// Generator state after the layer was computed
    pub rng: &'a Generator,
}

#[derive(Debug)]
struct CurrentLayer {
    index: usize,
    cell: Cell,
    params: SimParams,
    time: f64,
    rng: Generator,
}

/// Accepts chunks which decode into a cell of the stored shape.
#[derive(Default)]
struct LayerValidator {
    cell: Option<Cell>,
}

impl ChunkValidator for LayerValidator {
    fn configuration(&mut self, meta: &[u8], bin: &[u8]) -> bool {
        match parse_service_chunk(meta, bin).and_then(|e| decode_configuration(&e)) {
            Ok(config) => {
                self.cell = Some(config.blank_cell());
                true
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %_e, "rejected cell configuration");
                false
            }
        }
    }

    fn service(&mut self, meta: &[u8], bin: &[u8]) -> bool {
        parse_service_chunk(meta, bin)
            .and_then(|e| decode_sim_params(&e))
            .is_ok()
    }

    fn frames(&mut self, meta: &[u8], bin: &[u8]) -> Option<(f64, usize)> {
        let cell = self.cell.as_mut()?;
        let elements = parse_frame_chunk(meta, bin).ok()?;
        let mut start = None;
        for element in &elements {
            let (time, _) = decode_time_layer(element, cell).ok()?;
            start.get_or_insert(time);
        }
        Some((start?, elements.len()))
    }
}

/// Stored history of one cell.
///
/// The file is locked for the lifetime of the stream.
/// Layers appended to the stream are written to disk in groups and on [TimeStream::flush].
#[derive(Debug)]
pub struct TimeStream {
    path: PathBuf,
    explorer: FileExplorer,
    configuration: CellConfiguration,
    current: Option<CurrentLayer>,
    changed: bool,
}

impl TimeStream {
    fn locked<F>(path: &Path, f: F) -> Result<Self, StorageError>
    where
        F: FnOnce() -> Result<(FileExplorer, CellConfiguration), StorageError>,
    {
        lock_file(path)?;
        match f() {
            Ok((explorer, configuration)) => Ok(Self {
                path: path.to_owned(),
                explorer,
                configuration,
                current: None,
                changed: false,
            }),
            Err(e) => {
                unlock_file(path)?;
                Err(e)
            }
        }
    }

    fn checked_configuration(
        explorer: &FileExplorer,
    ) -> Result<CellConfiguration, StorageError> {
        VersionTag::decode(explorer.version()).check_compatible()?;
        decode_configuration(explorer.configuration()?)
    }

    /// Creates a new file for `cell` in its initial state.
    ///
    /// `seed` is the seed the user gave for the ensemble, `-1` if it was taken from the clock.
    pub fn create(
        path: impl AsRef<Path>,
        cell: &Cell,
        rng: &Generator,
        seed: i64,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut stream = Self::locked(path, || {
            let mut explorer = FileExplorer::create(
                path,
                DEFAULT_ELEMENTS_PER_CHUNK,
                VersionTag::current().encode(),
            )?;
            let element = encode_configuration(cell, rng, seed)?;
            let configuration = decode_configuration(&element)?;
            explorer.append_configuration(element)?;
            Ok((explorer, configuration))
        })?;
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), "created time stream");
        stream.changed = true;
        Ok(stream)
    }

    /// Opens a properly closed file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        Self::locked(path, || {
            let explorer = FileExplorer::open(path, DEFAULT_ELEMENTS_PER_CHUNK)?;
            let configuration = Self::checked_configuration(&explorer)?;
            Ok((explorer, configuration))
        })
    }

    /// Opens a file and drops every chunk behind the first damaged one.
    pub fn repair(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        Self::locked(path, || {
            let mut validator = LayerValidator::default();
            let explorer =
                FileExplorer::repair(path, DEFAULT_ELEMENTS_PER_CHUNK, &mut validator)?;
            let configuration = Self::checked_configuration(&explorer)?;
            Ok((explorer, configuration))
        })
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shape and initial generator of the stored cell.
    pub fn configuration(&self) -> &CellConfiguration {
        &self.configuration
    }

    /// Number of stored time layers.
    pub fn layer_count(&self) -> usize {
        self.explorer.layer_count()
    }

    /// Parameter records in the order they were appended.
    pub fn params(&self) -> Result<Vec<SimParams>, StorageError> {
        self.explorer.params().iter().map(decode_sim_params).collect()
    }

    /// Advances to the next layer. Returns `false` at the end of the stream.
    pub fn move_next(&mut self) -> Result<bool, StorageError> {
        let next = self.current.as_ref().map(|c| c.index + 1).unwrap_or(0);
        if next >= self.layer_count() {
            return Ok(false);
        }
        self.move_to(next)?;
        Ok(true)
    }

    /// Moves to the layer with the given index.
    pub fn move_to(&mut self, index: usize) -> Result<(), StorageError> {
        if index >= self.layer_count() {
            return Err(StorageError::IndexError(
                format!("layer index {index} is out of range").into(),
            ));
        }
        if self.current.as_ref().is_some_and(|c| c.index == index) {
            return Ok(());
        }
        let mut cell = match self.current.take() {
            Some(current) => current.cell,
            None => self.configuration.blank_cell(),
        };
        let (element, params) = self.explorer.time_layer(index)?;
        let (time, rng) = decode_time_layer(element, &mut cell)?;
        let params = decode_sim_params(params)?;
        self.current = Some(CurrentLayer {
            index,
            cell,
            params,
            time,
            rng,
        });
        Ok(())
    }

    /// Forgets the current position.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Time of a layer without decoding the cell.
    pub fn layer_time(&mut self, index: usize) -> Result<f64, StorageError> {
        let (element, _) = self.explorer.time_layer(index)?;
        decode_time(element)
    }

    /// Layer at the current position, [None] before the first move.
    pub fn current(&self) -> Option<TimeLayer<'_>> {
        self.current.as_ref().map(|c| TimeLayer {
            index: c.index,
            cell: &c.cell,
            params: &c.params,
            time: c.time,
            rng: &c.rng,
        })
    }

    /// Appends a parameter record for all following layers. Resets the position.
    pub fn append_params(&mut self, params: &SimParams) -> Result<(), StorageError> {
        self.reset();
        self.explorer.append_params(encode_sim_params(params)?)?;
        self.changed = true;
        Ok(())
    }

    /// Appends the state of `cell` at `time`. Resets the position.
    pub fn append_layer(
        &mut self,
        cell: &Cell,
        time: f64,
        rng: &Generator,
    ) -> Result<(), StorageError> {
        let shape = (self.configuration.chr_pairs, self.configuration.mts_per_pole);
        if cell.config() != shape {
            return Err(StorageError::FormatError(format!(
                "cell with shape {:?} does not match stored shape {shape:?}",
                cell.config()
            )));
        }
        self.reset();
        self.explorer
            .append_frame(time, encode_time_layer(cell, time, rng)?)?;
        self.changed = true;
        Ok(())
    }

    /// Writes pending layers and the table.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.changed {
            self.explorer.flush()?;
            self.changed = false;
        }
        Ok(())
    }
}

impl Drop for TimeStream {
    fn drop(&mut self) {
        let result = self.flush().and_then(|_| unlock_file(&self.path));
        if let Err(_e) = result {
            #[cfg(feature = "tracing")]
            tracing::error!(path = %self.path.display(), error = %_e, "could not close time stream");
        }
    }
}

#[cfg(test)]
mod test_time_stream {
    use super::*;
    use crate::cell::CellObjectProvider;
    use crate::storage::container::FileContainer;
    use crate::storage::lock::is_file_locked;
    use micosi_concepts::{Access, DoubleParam, RandomEngine, Real, Vec3};

    fn cell_at(step: usize) -> Cell {
        let mut cell = Cell::new(1, 2);
        cell.set_pole_positions(Vec3::new(-5e-6, 0.0, 0.0), Vec3::new(5e-6, 0.0, 0.0));
        cell.chromosome_mut(0)
            .unwrap()
            .set_position(&Vec3::new(step as Real * 1e-7, 0.0, 0.0));
        cell.mt_mut(1).unwrap().set_length(step as Real * 1e-8);
        cell
    }

    fn params(dt: f64) -> SimParams {
        let mut params = SimParams::new();
        params.set_access(Access::Initialize);
        params.set_double(DoubleParam::Dt, dt).unwrap();
        params.set_access(Access::ReadOnly);
        params
    }

    fn write_stream(path: &Path, layers: usize) {
        let mut rng = Generator::from_seed_u32(3);
        let mut stream = TimeStream::create(path, &cell_at(0), &rng, 3).unwrap();
        stream.append_params(&params(0.1)).unwrap();
        for step in 0..layers {
            rng.next();
            stream
                .append_layer(&cell_at(step), step as f64 * 0.1, &rng)
                .unwrap();
        }
    }

    #[test]
    fn write_then_iterate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.cell");
        write_stream(&path, 25);
        assert!(!is_file_locked(&path).unwrap());

        let mut stream = TimeStream::open(&path).unwrap();
        assert!(is_file_locked(&path).unwrap());
        assert_eq!(stream.layer_count(), 25);
        assert_eq!(stream.configuration().seed, 3);
        assert!(stream.current().is_none());
        let mut rng = Generator::from_seed_u32(3);
        let mut steps = 0;
        while stream.move_next().unwrap() {
            rng.next();
            let layer = stream.current().unwrap();
            assert_eq!(layer.index, steps);
            assert_eq!(layer.cell, &cell_at(steps));
            assert_eq!(layer.time, steps as f64 * 0.1);
            assert_eq!(layer.rng.serialize_state(), rng.serialize_state());
            assert_eq!(layer.params.get_double(DoubleParam::Dt), 0.1);
            steps += 1;
        }
        assert_eq!(steps, 25);
        assert_eq!(stream.layer_time(13).unwrap(), 13.0 * 0.1);
        stream.move_to(4).unwrap();
        assert_eq!(
            stream.current().unwrap().cell.chromosome(0).unwrap().position().x,
            4.0 * 1e-7
        );
        assert!(matches!(stream.move_to(25), Err(StorageError::IndexError(_))));
        drop(stream);
        assert!(!is_file_locked(&path).unwrap());
    }

    #[test]
    fn created_stream_is_written_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.cell");
        let stream = TimeStream::create(&path, &cell_at(0), &Generator::from_seed_u32(8), 8).unwrap();
        drop(stream);
        assert!(!is_file_locked(&path).unwrap());

        let stream = TimeStream::open(&path).unwrap();
        assert_eq!(stream.layer_count(), 0);
        assert_eq!(stream.configuration().seed, 8);
        assert!(stream.params().unwrap().is_empty());
    }

    #[test]
    fn locked_file_cannot_be_opened_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.cell");
        write_stream(&path, 1);
        let _first = TimeStream::open(&path).unwrap();
        assert!(matches!(
            TimeStream::open(&path),
            Err(StorageError::LockError(_))
        ));
    }

    #[test]
    fn failed_open_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.cell");
        assert!(TimeStream::open(&path).is_err());
        assert!(!is_file_locked(&path).unwrap());
    }

    #[test]
    fn continue_appending_after_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.cell");
        write_stream(&path, 3);
        {
            let mut stream = TimeStream::open(&path).unwrap();
            stream.append_params(&params(0.2)).unwrap();
            stream
                .append_layer(&cell_at(3), 0.4, &Generator::from_seed_u32(1))
                .unwrap();
        }
        let mut stream = TimeStream::open(&path).unwrap();
        assert_eq!(stream.layer_count(), 4);
        assert_eq!(stream.params().unwrap().len(), 2);
        stream.move_to(3).unwrap();
        assert_eq!(stream.current().unwrap().params.get_double(DoubleParam::Dt), 0.2);
        stream.move_to(2).unwrap();
        assert_eq!(stream.current().unwrap().params.get_double(DoubleParam::Dt), 0.1);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.cell");
        let rng = Generator::from_seed_u32(3);
        let mut stream = TimeStream::create(&path, &cell_at(0), &rng, -1).unwrap();
        stream.append_params(&params(0.1)).unwrap();
        assert!(stream.append_layer(&Cell::new(2, 2), 0.0, &rng).is_err());
    }

    #[test]
    fn repair_recovers_complete_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.cell");
        write_stream(&path, 25);
        let last = {
            let fc = FileContainer::open(&path).unwrap();
            fc.table().last().unwrap().offset
        };
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_len(last + 10).unwrap();
        drop(file);
        assert!(TimeStream::open(&path).is_err());

        {
            let mut stream = TimeStream::repair(&path).unwrap();
            assert_eq!(stream.layer_count(), 20);
            stream
                .append_layer(&cell_at(20), 2.0, &Generator::from_seed_u32(1))
                .unwrap();
        }
        let mut stream = TimeStream::open(&path).unwrap();
        assert_eq!(stream.layer_count(), 21);
        stream.move_to(20).unwrap();
        assert_eq!(stream.current().unwrap().cell, &cell_at(20));
    }

    #[test]
    fn other_file_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cell.cell");
        let mut tag = VersionTag::current();
        tag.file_format = 1;
        {
            let mut explorer = FileExplorer::create(&path, 10, tag.encode()).unwrap();
            let element =
                encode_configuration(&cell_at(0), &Generator::from_seed_u32(1), 1).unwrap();
            explorer.append_configuration(element).unwrap();
        }
        assert!(matches!(
            TimeStream::open(&path),
            Err(StorageError::VersionError(_))
        ));
        assert!(!is_file_locked(&path).unwrap());
    }
}
