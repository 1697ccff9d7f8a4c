//! Park persistence
//!
//! A versioned, chunked binary format for saving and restoring parks. Files
//! written by older builds are opened through an ordered set of version
//! gates that reinterpret old encodings; the current build always writes the
//! current version.

pub mod codec;
pub mod container;
pub mod error;
pub mod migrate;
pub mod park_file;
pub mod repository;
pub mod selector;
pub mod state;

pub use codec::Compression;
pub use container::{ChunkId, CompatibilityPolicy, ContainerHeader, ContainerReader};
pub use error::{Error, Result, VersionBound};
pub use migrate::{MigrationReport, CURRENT_VERSION, MIN_FORWARD_COMPATIBLE};
pub use park_file::{
    export, import, load, save, LoadOptions, LoadReport, LoadWarning, LoadedPark, PreviewImage, SaveOptions,
};
pub use repository::{InMemoryRepository, ObjectDefinition, ObjectOrigin, ObjectRepository, Overlay};
pub use selector::ExportList;
pub use state::ParkState;
