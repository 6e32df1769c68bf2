//! Stored simulations.
//!
//! Every cell of an ensemble is written into its own file.
//! The layers of this module build on each other:
//!
//! | Module | Content |
//! | --- | --- |
//! | [container] | Binary file of chunks with a trailing table of contents |
//! | [explorer] | Configuration, parameter records and groups of time layers inside chunks |
//! | [codec] | XML descriptions with binary payloads for cells, parameters and generators |
//! | [time_stream] | Locked sequential and random access to the history of one cell |
//!
//! Files which were not closed properly have no valid table.
//! They can be recovered with [TimeStream::repair] which keeps every chunk up to the first
//! damaged one.

pub mod codec;
pub mod container;
pub mod explorer;
pub mod lock;
pub mod time_stream;

pub use codec::CellConfiguration;
pub use explorer::{ChunkElement, FileExplorer};
pub use lock::{is_file_locked, lock_file, unlock_file};
pub use time_stream::{TimeLayer, TimeStream};
