//! Time layers on top of the [FileContainer].
//!
//! The first service chunk holds the cell configuration. Every later service chunk holds a
//! parameter record which applies to all time layers following it.
//! Time layers are grouped into frame chunks with up to `elements_per_chunk` elements.
//! Each frame chunk has one XML child per layer in its metadata and the binary layout
//!
//! ```text
//! u64 capacity | u64 offsets[capacity] | u64 sizes[capacity] | payload*
//! ```

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::container::{ChunkKind, ChunkValidator, FileContainer};
use crate::errors::StorageError;

/// Default number of time layers per frame chunk.
pub const DEFAULT_ELEMENTS_PER_CHUNK: usize = 10;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"no\" ?>\n";
const SERVICE_ROOT: &str = "ServiceChunk";
const FRAMES_ROOT: &str = "Chunk";

/// One XML element together with the binary payload its `"offset:size"` attributes point into.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkElement {
    /// A single XML element without declaration
    pub xml: String,
    /// Payload of the element
    pub bin: Vec<u8>,
}

/// Splits the children of the root element into separate XML strings.
pub(crate) fn split_children(text: &str, root: &str) -> Result<Vec<String>, StorageError> {
    let mut reader = Reader::from_str(text);
    let mut children = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 0 && e.name().as_ref() != root.as_bytes() {
                    return Err(StorageError::FormatError(format!(
                        "expected root element {root}"
                    )));
                }
                if depth == 1 {
                    start = before;
                }
                depth += 1;
            }
            Event::Empty(e) => match depth {
                0 if e.name().as_ref() == root.as_bytes() => return Ok(children),
                0 => {
                    return Err(StorageError::FormatError(format!(
                        "expected root element {root}"
                    )))
                }
                1 => {
                    let after = reader.buffer_position() as usize;
                    children.push(text[before..after].to_owned());
                }
                _ => (),
            },
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                match depth {
                    0 => return Ok(children),
                    1 => {
                        let after = reader.buffer_position() as usize;
                        children.push(text[start..after].to_owned());
                    }
                    _ => (),
                }
            }
            Event::Eof => {
                return Err(StorageError::FormatError(
                    "unexpected end of chunk metadata".to_owned(),
                ))
            }
            _ => (),
        }
    }
}

fn meta_text(meta: &[u8]) -> Result<&str, StorageError> {
    let text = std::str::from_utf8(meta)
        .map_err(|e| StorageError::FormatError(format!("chunk metadata is not utf-8: {e}")))?;
    Ok(text.trim_end_matches('\0'))
}

/// Reads the element of a service chunk.
pub(crate) fn parse_service_chunk(meta: &[u8], bin: &[u8]) -> Result<ChunkElement, StorageError> {
    let xml = split_children(meta_text(meta)?, SERVICE_ROOT)?
        .into_iter()
        .next()
        .ok_or_else(|| StorageError::FormatError("empty service chunk".to_owned()))?;
    Ok(ChunkElement {
        xml,
        bin: bin.to_vec(),
    })
}

fn encode_service_chunk(element: &ChunkElement) -> String {
    format!(
        "{XML_DECLARATION}<{SERVICE_ROOT}>{}</{SERVICE_ROOT}>",
        element.xml
    )
}

fn read_u64_at(bin: &[u8], index: usize) -> Result<u64, StorageError> {
    bin.get(8 * index..8 * index + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| StorageError::FormatError("frame chunk payload is too short".to_owned()))
}

/// Reads all elements of a frame chunk and checks the payload layout.
pub(crate) fn parse_frame_chunk(meta: &[u8], bin: &[u8]) -> Result<Vec<ChunkElement>, StorageError> {
    let capacity = read_u64_at(bin, 0)? as usize;
    let first_offset = capacity
        .checked_mul(16)
        .and_then(|n| n.checked_add(8))
        .filter(|&n| capacity > 0 && n <= bin.len())
        .ok_or_else(|| {
            StorageError::FormatError(format!("incorrect frame chunk capacity {capacity}"))
        })?;
    let children = split_children(meta_text(meta)?, FRAMES_ROOT)?;
    if children.is_empty() || children.len() > capacity {
        return Err(StorageError::FormatError(format!(
            "frame chunk has {} elements for capacity {capacity}",
            children.len()
        )));
    }
    let mut offset = first_offset;
    children
        .into_iter()
        .enumerate()
        .map(|(i, xml)| {
            let stored_offset = read_u64_at(bin, 1 + i)? as usize;
            let size = read_u64_at(bin, 1 + capacity + i)? as usize;
            let end = offset.checked_add(size).filter(|&end| end <= bin.len());
            match end {
                Some(end) if stored_offset == offset => {
                    let element = ChunkElement {
                        xml,
                        bin: bin[offset..end].to_vec(),
                    };
                    offset = end;
                    Ok(element)
                }
                _ => Err(StorageError::FormatError(
                    "corrupted offsets in frame chunk".to_owned(),
                )),
            }
        })
        .collect()
}

fn encode_frame_chunk(elements: &[ChunkElement], capacity: usize) -> (String, Vec<u8>) {
    let mut meta = format!("{XML_DECLARATION}<{FRAMES_ROOT}>");
    let header = 8 + 16 * capacity;
    let payload: usize = elements.iter().map(|e| e.bin.len()).sum();
    let mut offsets = vec![0u64; capacity];
    let mut sizes = vec![0u64; capacity];
    let mut bin = Vec::with_capacity(header + payload);
    bin.resize(header, 0);
    for (i, element) in elements.iter().enumerate() {
        meta.push_str(&element.xml);
        offsets[i] = bin.len() as u64;
        sizes[i] = element.bin.len() as u64;
        bin.extend_from_slice(&element.bin);
    }
    meta.push_str(&format!("</{FRAMES_ROOT}>"));
    let words = std::iter::once(capacity as u64).chain(offsets).chain(sizes);
    for (i, word) in words.enumerate() {
        bin[8 * i..8 * i + 8].copy_from_slice(&word.to_le_bytes());
    }
    (meta, bin)
}

#[derive(Clone, Copy, Debug)]
struct FrameChunk {
    table_index: usize,
    first_layer: usize,
    count: usize,
    params: Option<usize>,
}

enum LayerLocation {
    Writing(usize),
    Stored(FrameChunk),
}

/// Random access to the time layers of a container.
#[derive(Debug)]
pub struct FileExplorer {
    container: FileContainer,
    elements_per_chunk: usize,
    configuration: Option<ChunkElement>,
    params: Vec<ChunkElement>,
    frames: Vec<FrameChunk>,
    writing: Vec<(f64, ChunkElement)>,
    reading: Option<(usize, Vec<ChunkElement>)>,
}

impl FileExplorer {
    fn with_container(container: FileContainer, elements_per_chunk: usize) -> Self {
        Self {
            container,
            elements_per_chunk: elements_per_chunk.max(1),
            configuration: None,
            params: Vec::new(),
            frames: Vec::new(),
            writing: Vec::new(),
            reading: None,
        }
    }

    /// Creates an empty file.
    pub fn create(
        path: impl AsRef<Path>,
        elements_per_chunk: usize,
        version: u64,
    ) -> Result<Self, StorageError> {
        let container = FileContainer::create(path, version)?;
        Ok(Self::with_container(container, elements_per_chunk))
    }

    /// Opens a properly closed file.
    pub fn open(path: impl AsRef<Path>, elements_per_chunk: usize) -> Result<Self, StorageError> {
        let container = FileContainer::open(path)?;
        let mut explorer = Self::with_container(container, elements_per_chunk);
        explorer.read_table()?;
        Ok(explorer)
    }

    /// Repairs a file and opens it. See [FileContainer::repair].
    pub fn repair(
        path: impl AsRef<Path>,
        elements_per_chunk: usize,
        validator: &mut dyn ChunkValidator,
    ) -> Result<Self, StorageError> {
        let container = FileContainer::repair(path, validator)?;
        let mut explorer = Self::with_container(container, elements_per_chunk);
        explorer.read_table()?;
        Ok(explorer)
    }

    fn read_table(&mut self) -> Result<(), StorageError> {
        let table = self.container.table().to_vec();
        match table.first() {
            Some(header) if header.kind == ChunkKind::Service => (),
            _ => {
                return Err(StorageError::FormatError(
                    "file does not start with a cell configuration".to_owned(),
                ))
            }
        }
        let chunk = self.container.load_chunk(0)?;
        self.configuration = Some(parse_service_chunk(&chunk.meta, &chunk.bin)?);
        let mut layers = 0;
        for (table_index, header) in table.iter().enumerate().skip(1) {
            match header.kind {
                ChunkKind::Service => {
                    let chunk = self.container.load_chunk(table_index)?;
                    self.params.push(parse_service_chunk(&chunk.meta, &chunk.bin)?);
                }
                ChunkKind::Frames => {
                    self.frames.push(FrameChunk {
                        table_index,
                        first_layer: layers,
                        count: header.count,
                        params: self.params.len().checked_sub(1),
                    });
                    layers += header.count;
                }
            }
        }
        Ok(())
    }

    /// Version word of the file.
    pub fn version(&self) -> u64 {
        self.container.version()
    }

    /// Cell configuration record.
    pub fn configuration(&self) -> Result<&ChunkElement, StorageError> {
        self.configuration.as_ref().ok_or_else(|| {
            StorageError::FormatError("cell configuration was not stored".to_owned())
        })
    }

    /// All parameter records in file order.
    pub fn params(&self) -> &[ChunkElement] {
        &self.params
    }

    fn stored_layer_count(&self) -> usize {
        self.frames.last().map(|f| f.first_layer + f.count).unwrap_or(0)
    }

    /// Number of time layers, including the ones not yet written to disk.
    pub fn layer_count(&self) -> usize {
        self.stored_layer_count() + self.writing.len()
    }

    fn locate(&self, n: usize) -> Result<LayerLocation, StorageError> {
        if n >= self.layer_count() {
            return Err(StorageError::IndexError(
                format!("time layer {n} is out of range").into(),
            ));
        }
        let stored = self.stored_layer_count();
        if n >= stored {
            return Ok(LayerLocation::Writing(n - stored));
        }
        let index = self.frames.partition_point(|f| f.first_layer + f.count <= n);
        Ok(LayerLocation::Stored(self.frames[index]))
    }

    fn params_not_found() -> StorageError {
        StorageError::FormatError("simulation parameters of time layer not found".to_owned())
    }

    /// Returns the `n`-th time layer and the parameter record it was computed with.
    pub fn time_layer(
        &mut self,
        n: usize,
    ) -> Result<(&ChunkElement, &ChunkElement), StorageError> {
        let (source, params) = match self.locate(n)? {
            LayerLocation::Writing(index) => {
                (LayerLocation::Writing(index), self.params.len().checked_sub(1))
            }
            LayerLocation::Stored(frame) => {
                if self.reading.as_ref().map(|(i, _)| *i) != Some(frame.table_index) {
                    let chunk = self.container.load_chunk(frame.table_index)?;
                    let elements = parse_frame_chunk(&chunk.meta, &chunk.bin)?;
                    if elements.len() != frame.count {
                        return Err(StorageError::FormatError(format!(
                            "frame chunk holds {} layers instead of {}",
                            elements.len(),
                            frame.count
                        )));
                    }
                    self.reading = Some((frame.table_index, elements));
                }
                (LayerLocation::Stored(frame), frame.params)
            }
        };
        let params = params
            .and_then(|p| self.params.get(p))
            .ok_or_else(Self::params_not_found)?;
        let element = match source {
            LayerLocation::Writing(index) => self.writing.get(index).map(|(_, e)| e),
            LayerLocation::Stored(frame) => self
                .reading
                .as_ref()
                .and_then(|(_, elements)| elements.get(n - frame.first_layer)),
        };
        let element = element.ok_or_else(|| {
            StorageError::IndexError(format!("time layer {n} is out of range").into())
        })?;
        Ok((element, params))
    }

    /// Writes the cell configuration. Has to be the first record of a new file.
    pub fn append_configuration(&mut self, element: ChunkElement) -> Result<(), StorageError> {
        if self.configuration.is_some() || !self.container.table().is_empty() {
            return Err(StorageError::FormatError(
                "cell configuration is already stored".to_owned(),
            ));
        }
        self.container
            .append_service_chunk(encode_service_chunk(&element).as_bytes(), &element.bin)?;
        self.configuration = Some(element);
        Ok(())
    }

    /// Writes a parameter record which applies to all following time layers.
    pub fn append_params(&mut self, element: ChunkElement) -> Result<(), StorageError> {
        self.configuration()?;
        self.flush_frames()?;
        self.container
            .append_service_chunk(encode_service_chunk(&element).as_bytes(), &element.bin)?;
        self.params.push(element);
        Ok(())
    }

    /// Adds a time layer. The layer is written once its frame chunk is full or on flush.
    pub fn append_frame(&mut self, time: f64, element: ChunkElement) -> Result<(), StorageError> {
        if self.params.is_empty() {
            return Err(StorageError::FormatError(
                "simulation parameters have to be stored before time layers".to_owned(),
            ));
        }
        self.writing.push((time, element));
        if self.writing.len() >= self.elements_per_chunk {
            self.flush_frames()?;
        }
        Ok(())
    }

    fn flush_frames(&mut self) -> Result<(), StorageError> {
        let Some((time, _)) = self.writing.first() else {
            return Ok(());
        };
        let time = *time;
        let count = self.writing.len();
        let capacity = self.elements_per_chunk.max(count);
        let elements: Vec<ChunkElement> = self.writing.drain(..).map(|(_, e)| e).collect();
        let (meta, bin) = encode_frame_chunk(&elements, capacity);
        let first_layer = self.stored_layer_count();
        self.container
            .append_frame_chunk(time, count, meta.as_bytes(), &bin)?;
        self.frames.push(FrameChunk {
            table_index: self.container.table().len() - 1,
            first_layer,
            count,
            params: self.params.len().checked_sub(1),
        });
        Ok(())
    }

    /// Writes pending time layers and the table.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.flush_frames()?;
        self.container.flush()
    }
}

impl Drop for FileExplorer {
    fn drop(&mut self) {
        if let Err(_e) = self.flush_frames() {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_e, "could not write pending time layers");
        }
    }
}
