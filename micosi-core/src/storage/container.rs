//! Chunked binary container.
//!
//! ```text
//! "?header" | u64 offset of first chunk | u64 version | u64 offset of table
//! chunk*
//! "?table"  | u64 count | entry*
//! ```
//!
//! A frame chunk is `"?frame" | f64 time | u64 meta size | u64 bin size | meta | bin`,
//! a service chunk is `"?service" | u64 meta size | u64 bin size | meta | bin`.
//! Each table entry holds `f64 start time | u32 count | u32 type | u64 offset | u64 chunk size |
//! u64 meta size | u64 bin size`. All numbers are little-endian.
//!
//! The table is rewritten behind the last chunk whenever the container is flushed.
//! Appending overwrites the previous table, so a file whose writer did not flush can only be
//! read after [FileContainer::repair].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::StorageError;

const HEADER_TAG: &[u8] = b"?header";
const FRAME_TAG: &[u8] = b"?frame";
const SERVICE_TAG: &[u8] = b"?service";
const TABLE_TAG: &[u8] = b"?table";

/// Size of the file header in bytes.
pub const HEADER_SIZE: u64 = HEADER_TAG.len() as u64 + 3 * 8;
const TABLE_OFFSET_POSITION: u64 = HEADER_TAG.len() as u64 + 2 * 8;
const TABLE_ENTRY_SIZE: u64 = 8 + 4 + 4 + 4 * 8;
const NO_TABLE: u64 = u64::MAX;

/// Kind of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    /// Untimed records such as the cell configuration or simulation parameters
    Service,
    /// A group of time layers
    Frames,
}

impl ChunkKind {
    fn code(&self) -> u32 {
        match self {
            ChunkKind::Frames => 1,
            ChunkKind::Service => 2,
        }
    }

    fn from_code(code: u32) -> Result<Self, StorageError> {
        match code {
            1 => Ok(ChunkKind::Frames),
            2 => Ok(ChunkKind::Service),
            _ => Err(StorageError::FormatError(format!(
                "unknown chunk type {code}"
            ))),
        }
    }
}

/// Table entry describing one chunk without its content.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkHeader {
    /// Service or frames
    pub kind: ChunkKind,
    /// Time of the first frame, `0.0` for service chunks
    pub start_time: f64,
    /// Number of elements in the chunk
    pub count: usize,
    /// Position of the chunk in the file
    pub offset: u64,
    /// Total size including the chunk preamble
    pub size: u64,
    /// Size of the metadata record
    pub meta_size: u64,
    /// Size of the binary record
    pub bin_size: u64,
}

/// A loaded chunk.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// Table entry of the chunk
    pub header: ChunkHeader,
    /// Metadata record
    pub meta: Vec<u8>,
    /// Binary record
    pub bin: Vec<u8>,
}

/// Decides which chunks survive [FileContainer::repair].
///
/// Chunks are checked in file order. The first rejected chunk and everything behind it is
/// removed from the file.
pub trait ChunkValidator {
    /// Checks the first chunk, which has to be a service chunk.
    fn configuration(&mut self, meta: &[u8], bin: &[u8]) -> bool;

    /// Checks any later service chunk.
    fn service(&mut self, meta: &[u8], bin: &[u8]) -> bool;

    /// Checks a frame chunk and returns its start time and element count.
    fn frames(&mut self, meta: &[u8], bin: &[u8]) -> Option<(f64, usize)>;
}

fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, StorageError> {
    let mut buf = vec![0; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, StorageError> {
    let mut buf = [0; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, StorageError> {
    let mut buf = [0; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64, StorageError> {
    Ok(f64::from_bits(read_u64(reader)?))
}

fn expect_tag<R: Read>(reader: &mut R, tag: &[u8]) -> Result<(), StorageError> {
    if read_bytes(reader, tag.len())? != tag {
        return Err(StorageError::FormatError(format!(
            "cannot read {}",
            String::from_utf8_lossy(tag)
        )));
    }
    Ok(())
}

fn encode_header(version: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
    buf.extend_from_slice(HEADER_TAG);
    buf.extend_from_slice(&HEADER_SIZE.to_le_bytes());
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&NO_TABLE.to_le_bytes());
    buf
}

fn encode_chunk(kind: ChunkKind, time: f64, meta: &[u8], bin: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SERVICE_TAG.len() + 24 + meta.len() + bin.len());
    match kind {
        ChunkKind::Frames => {
            buf.extend_from_slice(FRAME_TAG);
            buf.extend_from_slice(&time.to_le_bytes());
        }
        ChunkKind::Service => buf.extend_from_slice(SERVICE_TAG),
    }
    buf.extend_from_slice(&(meta.len() as u64).to_le_bytes());
    buf.extend_from_slice(&(bin.len() as u64).to_le_bytes());
    buf.extend_from_slice(meta);
    buf.extend_from_slice(bin);
    buf
}

fn encode_table(table: &[ChunkHeader]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TABLE_TAG.len() + 8 + table.len() * TABLE_ENTRY_SIZE as usize);
    buf.extend_from_slice(TABLE_TAG);
    buf.extend_from_slice(&(table.len() as u64).to_le_bytes());
    for header in table {
        buf.extend_from_slice(&header.start_time.to_le_bytes());
        buf.extend_from_slice(&(header.count as u32).to_le_bytes());
        buf.extend_from_slice(&header.kind.code().to_le_bytes());
        buf.extend_from_slice(&header.offset.to_le_bytes());
        buf.extend_from_slice(&header.size.to_le_bytes());
        buf.extend_from_slice(&header.meta_size.to_le_bytes());
        buf.extend_from_slice(&header.bin_size.to_le_bytes());
    }
    buf
}

/// Returns the version and the table offset.
fn read_header<R: Read>(reader: &mut R) -> Result<(u64, u64), StorageError> {
    expect_tag(reader, HEADER_TAG)?;
    let first_chunk = read_u64(reader)?;
    let version = read_u64(reader)?;
    let table_offset = read_u64(reader)?;
    if first_chunk != HEADER_SIZE {
        return Err(StorageError::FormatError(
            "bad offset to first chunk".to_owned(),
        ));
    }
    Ok((version, table_offset))
}

/// Reads the preamble of a chunk.
/// Returns kind, time, metadata size, binary size and preamble size.
fn read_chunk_preamble<R: Read>(
    reader: &mut R,
) -> Result<(ChunkKind, f64, u64, u64, u64), StorageError> {
    let start = read_bytes(reader, 2)?;
    let (kind, time, preamble) = match start.as_slice() {
        b"?f" => {
            expect_tag(reader, &FRAME_TAG[2..])?;
            let time = read_f64(reader)?;
            (ChunkKind::Frames, time, FRAME_TAG.len() + 8)
        }
        b"?s" => {
            expect_tag(reader, &SERVICE_TAG[2..])?;
            (ChunkKind::Service, 0.0, SERVICE_TAG.len())
        }
        _ => return Err(StorageError::FormatError("bad chunk type".to_owned())),
    };
    let meta_size = read_u64(reader)?;
    let bin_size = read_u64(reader)?;
    Ok((kind, time, meta_size, bin_size, preamble as u64 + 16))
}

fn read_table<R: Read>(reader: &mut R, file_len: u64) -> Result<Vec<ChunkHeader>, StorageError> {
    expect_tag(reader, TABLE_TAG)?;
    let count = read_u64(reader)?;
    if count.saturating_mul(TABLE_ENTRY_SIZE) > file_len {
        return Err(StorageError::FormatError(
            "table is larger than the file".to_owned(),
        ));
    }
    (0..count)
        .map(|_| {
            let start_time = read_f64(reader)?;
            let count = read_u32(reader)? as usize;
            let kind = ChunkKind::from_code(read_u32(reader)?)?;
            Ok(ChunkHeader {
                kind,
                start_time,
                count,
                offset: read_u64(reader)?,
                size: read_u64(reader)?,
                meta_size: read_u64(reader)?,
                bin_size: read_u64(reader)?,
            })
        })
        .collect()
}

/// Open container file.
///
/// The table is written when [FileContainer::flush] is called or the container is dropped.
#[derive(Debug)]
pub struct FileContainer {
    file: File,
    path: PathBuf,
    version: u64,
    table: Vec<ChunkHeader>,
    new_chunk_start: u64,
    rewrite_table: bool,
}

impl FileContainer {
    /// Creates a new container, replacing an existing file.
    pub fn create(path: impl AsRef<Path>, version: u64) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&encode_header(version))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), version, "created container");
        Ok(Self {
            file,
            path: path.to_owned(),
            version,
            table: Vec::new(),
            new_chunk_start: HEADER_SIZE,
            rewrite_table: true,
        })
    }

    /// Opens a container which was closed properly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut file = File::options().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();
        let (version, table_offset) = read_header(&mut file)?;
        if table_offset == NO_TABLE || table_offset >= file_len {
            return Err(StorageError::FormatError(format!(
                "table of {} is missing, the file has to be repaired",
                path.display()
            )));
        }
        file.seek(SeekFrom::Start(table_offset))?;
        let table = read_table(&mut file, file_len)?;
        if let Some(header) = table
            .iter()
            .find(|h| h.offset.saturating_add(h.size) > table_offset)
        {
            return Err(StorageError::FormatError(format!(
                "chunk at {} overlaps the table",
                header.offset
            )));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), chunks = table.len(), "opened container");
        Ok(Self {
            file,
            path: path.to_owned(),
            version,
            table,
            new_chunk_start: table_offset,
            rewrite_table: false,
        })
    }

    /// Rebuilds the table by scanning all chunks.
    ///
    /// Scanning stops at the first chunk which cannot be read or is rejected by `validator`.
    /// The file is truncated behind the last accepted chunk.
    pub fn repair(
        path: impl AsRef<Path>,
        validator: &mut dyn ChunkValidator,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut file = File::options().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();
        let (version, _) = read_header(&mut file)?;
        let mut table = Vec::new();
        let mut new_chunk_start = HEADER_SIZE;
        while let Some(header) = Self::validate_chunk(
            &mut file,
            file_len,
            new_chunk_start,
            table.is_empty(),
            validator,
        ) {
            new_chunk_start += header.size;
            table.push(header);
        }
        file.set_len(new_chunk_start)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %path.display(),
            chunks = table.len(),
            removed_bytes = file_len.saturating_sub(new_chunk_start),
            "repaired container"
        );
        Ok(Self {
            file,
            path: path.to_owned(),
            version,
            table,
            new_chunk_start,
            rewrite_table: true,
        })
    }

    fn validate_chunk(
        file: &mut File,
        file_len: u64,
        offset: u64,
        first: bool,
        validator: &mut dyn ChunkValidator,
    ) -> Option<ChunkHeader> {
        file.seek(SeekFrom::Start(offset)).ok()?;
        let (kind, _, meta_size, bin_size, preamble) = read_chunk_preamble(file).ok()?;
        let size = preamble.checked_add(meta_size)?.checked_add(bin_size)?;
        if offset.checked_add(size)? > file_len {
            return None;
        }
        let meta = read_bytes(file, meta_size as usize).ok()?;
        let bin = read_bytes(file, bin_size as usize).ok()?;
        let (start_time, count) = match (kind, first) {
            (ChunkKind::Service, true) => validator.configuration(&meta, &bin).then_some((0.0, 1))?,
            (ChunkKind::Service, false) => validator.service(&meta, &bin).then_some((0.0, 1))?,
            (ChunkKind::Frames, true) => return None,
            (ChunkKind::Frames, false) => validator.frames(&meta, &bin)?,
        };
        Some(ChunkHeader {
            kind,
            start_time,
            count,
            offset,
            size,
            meta_size,
            bin_size,
        })
    }

    /// Path of the container file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version word stored in the header.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Entries of all chunks in file order.
    pub fn table(&self) -> &[ChunkHeader] {
        &self.table
    }

    /// Reads the chunk with the given table index.
    pub fn load_chunk(&mut self, index: usize) -> Result<Chunk, StorageError> {
        let header = self.table.get(index).cloned().ok_or_else(|| {
            StorageError::IndexError(format!("no chunk with index {index}").into())
        })?;
        self.file.seek(SeekFrom::Start(header.offset))?;
        let (kind, _, meta_size, bin_size, _) = read_chunk_preamble(&mut self.file)?;
        if kind != header.kind || meta_size != header.meta_size || bin_size != header.bin_size {
            return Err(StorageError::FormatError(format!(
                "chunk {index} differs from its table entry"
            )));
        }
        let meta = read_bytes(&mut self.file, meta_size as usize)?;
        let bin = read_bytes(&mut self.file, bin_size as usize)?;
        Ok(Chunk { header, meta, bin })
    }

    fn append_chunk(
        &mut self,
        kind: ChunkKind,
        time: f64,
        count: usize,
        meta: &[u8],
        bin: &[u8],
    ) -> Result<(), StorageError> {
        let buf = encode_chunk(kind, time, meta, bin);
        self.file.seek(SeekFrom::Start(self.new_chunk_start))?;
        self.file.write_all(&buf)?;
        self.table.push(ChunkHeader {
            kind,
            start_time: time,
            count,
            offset: self.new_chunk_start,
            size: buf.len() as u64,
            meta_size: meta.len() as u64,
            bin_size: bin.len() as u64,
        });
        self.new_chunk_start += buf.len() as u64;
        self.rewrite_table = true;
        Ok(())
    }

    /// Appends a service chunk.
    pub fn append_service_chunk(&mut self, meta: &[u8], bin: &[u8]) -> Result<(), StorageError> {
        self.append_chunk(ChunkKind::Service, 0.0, 1, meta, bin)
    }

    /// Appends a chunk with `count` frames starting at `time`.
    pub fn append_frame_chunk(
        &mut self,
        time: f64,
        count: usize,
        meta: &[u8],
        bin: &[u8],
    ) -> Result<(), StorageError> {
        self.append_chunk(ChunkKind::Frames, time, count, meta, bin)
    }

    /// Writes the table and points the header to it.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if !self.rewrite_table {
            return Ok(());
        }
        let table = encode_table(&self.table);
        self.file.seek(SeekFrom::Start(self.new_chunk_start))?;
        self.file.write_all(&table)?;
        self.file.set_len(self.new_chunk_start + table.len() as u64)?;
        self.file.seek(SeekFrom::Start(TABLE_OFFSET_POSITION))?;
        self.file.write_all(&self.new_chunk_start.to_le_bytes())?;
        self.file.flush()?;
        self.rewrite_table = false;
        Ok(())
    }
}

impl Drop for FileContainer {
    fn drop(&mut self) {
        if let Err(_e) = self.flush() {
            #[cfg(feature = "tracing")]
            tracing::error!(path = %self.path.display(), error = %_e, "could not write table");
        }
    }
}

#[cfg(test)]
mod test_container {
    use super::*;

    struct AcceptAll;

    impl ChunkValidator for AcceptAll {
        fn configuration(&mut self, _: &[u8], _: &[u8]) -> bool {
            true
        }

        fn service(&mut self, _: &[u8], _: &[u8]) -> bool {
            true
        }

        fn frames(&mut self, meta: &[u8], _: &[u8]) -> Option<(f64, usize)> {
            Some((meta.len() as f64, 2))
        }
    }

    fn write_sample(path: &Path) {
        let mut fc = FileContainer::create(path, 42).unwrap();
        fc.append_service_chunk(b"config", &[1, 2, 3]).unwrap();
        fc.append_frame_chunk(0.5, 2, b"frames", &[7; 16]).unwrap();
        fc.append_service_chunk(b"params", &[]).unwrap();
    }

    #[test]
    fn header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cell");
        drop(FileContainer::create(&path, 42).unwrap());
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..7], b"?header");
        assert_eq!(u64::from_le_bytes(bytes[7..15].try_into().unwrap()), 31);
        assert_eq!(u64::from_le_bytes(bytes[15..23].try_into().unwrap()), 42);
        assert_eq!(u64::from_le_bytes(bytes[23..31].try_into().unwrap()), 31);
        assert_eq!(&bytes[31..37], b"?table");
        assert_eq!(bytes.len(), 31 + 6 + 8);
    }

    #[test]
    fn reopen_reads_table_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cell");
        write_sample(&path);

        let mut fc = FileContainer::open(&path).unwrap();
        assert_eq!(fc.version(), 42);
        let kinds: Vec<_> = fc.table().iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![ChunkKind::Service, ChunkKind::Frames, ChunkKind::Service]
        );
        assert_eq!(fc.table()[1].start_time, 0.5);
        assert_eq!(fc.table()[1].count, 2);
        assert_eq!(fc.table()[0].offset, HEADER_SIZE);
        assert_eq!(fc.table()[0].size, 8 + 16 + 6 + 3);

        let chunk = fc.load_chunk(1).unwrap();
        assert_eq!(chunk.meta, b"frames");
        assert_eq!(chunk.bin, vec![7; 16]);
        let chunk = fc.load_chunk(2).unwrap();
        assert_eq!(chunk.meta, b"params");
        assert!(chunk.bin.is_empty());
        assert!(matches!(fc.load_chunk(3), Err(StorageError::IndexError(_))));
    }

    #[test]
    fn append_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cell");
        write_sample(&path);
        {
            let mut fc = FileContainer::open(&path).unwrap();
            fc.append_frame_chunk(1.0, 1, b"more", &[9]).unwrap();
        }
        let mut fc = FileContainer::open(&path).unwrap();
        assert_eq!(fc.table().len(), 4);
        assert_eq!(fc.load_chunk(3).unwrap().bin, vec![9]);
        assert_eq!(fc.load_chunk(0).unwrap().meta, b"config");
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cell");
        std::fs::write(&path, b"this is not a container at all, really not").unwrap();
        assert!(matches!(
            FileContainer::open(&path),
            Err(StorageError::FormatError(_))
        ));
    }

    #[test]
    fn unflushed_file_needs_repair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cell");
        let mut fc = FileContainer::create(&path, 1).unwrap();
        fc.append_service_chunk(b"config", &[]).unwrap();
        // Simulates a crash before the table was written
        std::mem::forget(fc);
        assert!(FileContainer::open(&path).is_err());
        let fc = FileContainer::repair(&path, &mut AcceptAll).unwrap();
        assert_eq!(fc.table().len(), 1);
        drop(fc);
        assert_eq!(FileContainer::open(&path).unwrap().table().len(), 1);
    }

    #[test]
    fn repair_truncates_damaged_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cell");
        write_sample(&path);
        let second_end = {
            let fc = FileContainer::open(&path).unwrap();
            fc.table()[1].offset + fc.table()[1].size
        };
        // cut inside the third chunk
        let file = File::options().write(true).open(&path).unwrap();
        file.set_len(second_end + 5).unwrap();
        drop(file);

        let mut fc = FileContainer::repair(&path, &mut AcceptAll).unwrap();
        assert_eq!(fc.table().len(), 2);
        assert_eq!(fc.table()[1].start_time, 6.0);
        assert_eq!(fc.table()[1].count, 2);
        fc.append_service_chunk(b"again", &[]).unwrap();
        drop(fc);
        let mut fc = FileContainer::open(&path).unwrap();
        assert_eq!(fc.table().len(), 3);
        assert_eq!(fc.load_chunk(2).unwrap().meta, b"again");
    }

    #[test]
    fn repair_stops_at_rejected_chunk() {
        struct RejectFrames;
        impl ChunkValidator for RejectFrames {
            fn configuration(&mut self, _: &[u8], _: &[u8]) -> bool {
                true
            }
            fn service(&mut self, _: &[u8], _: &[u8]) -> bool {
                true
            }
            fn frames(&mut self, _: &[u8], _: &[u8]) -> Option<(f64, usize)> {
                None
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cell");
        write_sample(&path);
        let fc = FileContainer::repair(&path, &mut RejectFrames).unwrap();
        assert_eq!(fc.table().len(), 1);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            HEADER_SIZE + fc.table()[0].size
        );
    }
}
