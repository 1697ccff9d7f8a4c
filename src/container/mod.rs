//! Container layer: header, chunk directory and chunk payload area.
//!
//! Knows nothing about what a chunk contains; see `park_file` for that.

pub mod archive;
pub mod directory;
pub mod header;

pub use archive::{ContainerReader, ContainerWriter};
pub use directory::{ChunkDirectory, ChunkEntry, ChunkId};
pub use header::{CompatibilityPolicy, ContainerHeader, HEADER_SIZE, MAGIC};
