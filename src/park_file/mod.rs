//! Saving and loading whole parks.
//!
//! [`export`] writes the current version only. [`import`] accepts anything
//! the [`CompatibilityPolicy`] allows, decodes it, relinks references by id
//! and runs the migration pipeline before handing the park over.

mod chunks;



use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::codec::{Compression, Persist, Stream};
use crate::container::{CompatibilityPolicy, ContainerReader, ContainerWriter};
use crate::error::{Error, Result};
use crate::migrate::gates::{CURRENT_VERSION, MIN_FORWARD_COMPATIBLE};
use crate::migrate::{pipeline, MigrationContext, MigrationReport};
use crate::repository::{ObjectDefinition, ObjectRepository, Overlay};
use crate::selector;
use crate::state::{Dangling, ParkState};

/// Thumbnail stored alongside the park, one palette index per pixel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewImage {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
}

impl Persist for PreviewImage {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u16(&mut self.width)?;
        s.rw_u16(&mut self.height)?;
        s.rw_bytes(&mut self.pixels)?;
        if self.pixels.len() != self.width as usize * self.height as usize {
            return Err(Error::InvalidData(format!(
                "{}x{} preview has {} pixels",
                self.width,
                self.height,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub compression: Compression,
    /// Version of the oldest client expected to open the file
    pub target_client: Option<u32>,
    pub preview: Option<PreviewImage>,
    /// Definitions carried with the park, consulted when the repository
    /// lacks an object. Pass [`LoadedPark::packed_objects`] here to re-save
    /// a loaded park without losing what its file embedded.
    pub packed_objects: Vec<ObjectDefinition>,
    /// Write the file even if some objects in use cannot be found
    pub allow_unresolved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub policy: CompatibilityPolicy,
    /// Refuse loads that dropped data instead of reporting them
    pub strict: bool,
}

/// Something the loader recovered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    UnknownEntityType { tag: u8, length: u32 },
    DanglingReference { reference: Dangling },
}

impl LoadWarning {
    pub fn is_data_loss(&self) -> bool {
        match self {
            LoadWarning::UnknownEntityType { .. } => true,
            LoadWarning::DanglingReference { reference } => reference.cleared(),
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::UnknownEntityType { tag, length } => {
                write!(f, "skipped {length} byte entity of unknown type {tag}")
            }
            LoadWarning::DanglingReference { reference } => write!(f, "{reference}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub original_version: u32,
    pub migration: MigrationReport,
    pub warnings: Vec<LoadWarning>,
    /// Set when anything in the file could not be carried into the park
    pub data_loss: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedPark {
    pub park: ParkState,
    /// Object definitions embedded in the file
    pub packed_objects: Vec<ObjectDefinition>,
    pub preview: Option<PreviewImage>,
    pub report: LoadReport,
}

fn encode_file(
    park: &ParkState,
    repository: &dyn ObjectRepository,
    options: &SaveOptions,
    version: u32,
    min_version: u32,
) -> Result<Vec<u8>> {
    let selected = selector::select(park, &Overlay::new(repository, &options.packed_objects));
    if !selected.unresolved.is_empty() && !options.allow_unresolved {
        return Err(Error::UnresolvedObjects(selected.unresolved));
    }

    let mut snapshot = park.clone();
    let mut packed = selected.objects;
    let mut preview = options.preview.clone();

    let mut container = ContainerWriter::new(options.compression);
    chunks::encode(&mut container, &mut snapshot, &mut packed, preview.as_mut(), version)?;
    let bytes = container.finish_as(version, min_version)?;

    info!(
        version,
        bytes = bytes.len(),
        packed_objects = packed.len(),
        compression = ?options.compression,
        "saved park"
    );
    Ok(bytes)
}

/// Serialize `park` into a complete file at [`CURRENT_VERSION`].
///
/// Fails with [`Error::UnmigratedState`] if the park still holds data in a
/// pre-migration representation, and with [`Error::UnresolvedObjects`] if an
/// object in use is in neither the repository nor
/// [`SaveOptions::packed_objects`], unless unresolved objects are allowed.
pub fn export(park: &ParkState, repository: &dyn ObjectRepository, options: &SaveOptions) -> Result<Vec<u8>> {
    if let Some(leftover) = park.unmigrated() {
        return Err(Error::UnmigratedState(leftover));
    }
    if let Some(target) = options.target_client {
        if target < MIN_FORWARD_COMPATIBLE {
            warn!(
                target,
                min = MIN_FORWARD_COMPATIBLE,
                "saving for a client older than this format supports; it will refuse or misread the file"
            );
        }
    }
    encode_file(park, repository, options, CURRENT_VERSION, MIN_FORWARD_COMPATIBLE)
}

/// Write a file in the encoding of an older version, for exercising the
/// migration path end to end.
#[cfg(test)]
pub(crate) fn export_legacy(
    park: &ParkState,
    repository: &dyn ObjectRepository,
    options: &SaveOptions,
    version: u32,
) -> Result<Vec<u8>> {
    encode_file(park, repository, options, version, version)
}

/// Decode, relink and migrate a park file.
pub fn import(bytes: &[u8], repository: &dyn ObjectRepository, options: &LoadOptions) -> Result<LoadedPark> {
    let container = ContainerReader::open(bytes, &options.policy)?;
    let version = container.version();
    let chunks::Decoded { mut park, packed, preview, mut warnings } = chunks::decode(&container)?;

    for reference in park.relink() {
        warn!(%reference, "dangling reference");
        warnings.push(LoadWarning::DanglingReference { reference });
    }

    let ctx = MigrationContext::new(repository, &packed);
    let (park, migration) = pipeline::migrate(park, version, &ctx)?;

    let data_loss = warnings.iter().any(LoadWarning::is_data_loss);
    if data_loss {
        let summary = warnings
            .iter()
            .filter(|w| w.is_data_loss())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        if options.strict {
            return Err(Error::DataLoss(summary));
        }
        warn!(%summary, "park loaded with data loss");
    }

    info!(
        version,
        entities = park.entities.len(),
        rides = park.rides.len(),
        packed_objects = packed.len(),
        migrated = !migration.is_noop(),
        "loaded park"
    );

    Ok(LoadedPark {
        park,
        packed_objects: packed,
        preview,
        report: LoadReport { original_version: version, migration, warnings, data_loss },
    })
}

pub fn save(
    path: impl AsRef<Path>,
    park: &ParkState,
    repository: &dyn ObjectRepository,
    options: &SaveOptions,
) -> Result<()> {
    let bytes = export(park, repository, options)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>, repository: &dyn ObjectRepository, options: &LoadOptions) -> Result<LoadedPark> {
    let bytes = std::fs::read(path)?;
    import(&bytes, repository, options)
}
