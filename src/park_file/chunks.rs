//! Mapping between the park model and the container's chunks.

use tracing::{debug, warn};

use crate::codec::{checked_len, rw_vec, ChunkReader, ChunkWriter, Persist, Stream};
use crate::container::{ChunkId, ContainerReader, ContainerWriter};
use crate::error::{Error, Result};
use crate::migrate::gates::{PACKED_OBJECTS_CHUNK, PEEP_NAMES_AS_OBJECTS, PREVIEW_IMAGE_CHUNK, STAFF_PATROL_PER_ENTITY};
use crate::repository::ObjectDefinition;
use crate::state::{Entity, EntityId, EntityTable, LegacyData, ParkState, PatrolArea};

use super::{LoadWarning, PreviewImage};

/// Everything decoded from a container, before relinking and migration
#[derive(Debug, Default)]
pub(crate) struct Decoded {
    pub park: ParkState,
    pub packed: Vec<ObjectDefinition>,
    pub preview: Option<PreviewImage>,
    pub warnings: Vec<LoadWarning>,
}

fn write_chunk<F>(container: &mut ContainerWriter, id: ChunkId, version: u32, body: F) -> Result<()>
where
    F: FnOnce(&mut ChunkWriter) -> Result<()>,
{
    let mut writer = ChunkWriter::at_version(version);
    body(&mut writer)?;
    container.add_chunk(id, &writer.into_bytes())
}

/// Decode a chunk and check that its whole declared length was consumed.
fn read_chunk<'c, T, F>(chunk: ChunkId, mut reader: ChunkReader<'c>, body: F) -> Result<T>
where
    F: FnOnce(&mut ChunkReader<'c>) -> Result<T>,
{
    let value = body(&mut reader)?;
    if !reader.is_empty() {
        return Err(Error::ChunkLengthMismatch {
            chunk,
            declared: reader.len(),
            consumed: reader.position(),
        });
    }
    debug!(chunk = chunk.name(), bytes = reader.len(), "read chunk");
    Ok(value)
}

fn read_value<T: Persist + Default>(container: &ContainerReader, id: ChunkId) -> Result<T> {
    read_chunk(id, container.require(id)?, |r| {
        let mut value = T::default();
        value.persist(r)?;
        Ok(value)
    })
}

fn read_optional<T: Persist + Default>(container: &ContainerReader, id: ChunkId) -> Result<T> {
    match container.chunk_reader(id) {
        Some(reader) => read_chunk(id, reader, |r| {
            let mut value = T::default();
            value.persist(r)?;
            Ok(value)
        }),
        None => Ok(T::default()),
    }
}

/// Legacy patrol table entry
#[derive(Debug, Default)]
struct PatrolEntry {
    staff: EntityId,
    area: PatrolArea,
}

impl Persist for PatrolEntry {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.staff.persist(s)?;
        self.area.persist(s)
    }
}

fn write_entities(w: &mut ChunkWriter, entities: &mut EntityTable, legacy: &LegacyData) -> Result<()> {
    let mut count: u32 = checked_len(entities.len(), "entity table")?;
    w.rw_u32(&mut count)?;
    for entity in entities.iter_mut() {
        let mut body = ChunkWriter::at_version(w.version());
        entity.persist(&mut body)?;
        let body = body.into_bytes();
        w.inner().write_u8(entity.kind() as u8);
        w.inner().write_block(&body)?;
    }

    if !w.has(STAFF_PATROL_PER_ENTITY) {
        let mut table: Vec<PatrolEntry> = legacy
            .patrol_areas
            .iter()
            .map(|(staff, area)| PatrolEntry { staff: *staff, area: area.clone() })
            .collect();
        rw_vec(w, &mut table)?;
    }
    Ok(())
}

fn read_entities(
    r: &mut ChunkReader<'_>,
    legacy: &mut LegacyData,
    warnings: &mut Vec<LoadWarning>,
) -> Result<EntityTable> {
    let mut table = EntityTable::new();
    let mut count = 0u32;
    r.rw_u32(&mut count)?;

    for _ in 0..count {
        let mut tag = 0u8;
        let mut length = 0u32;
        r.rw_u8(&mut tag)?;
        r.rw_u32(&mut length)?;
        let mut body = r.sub(length as usize)?;

        match Entity::decode(tag, &mut body) {
            Ok(entity) => {
                if !body.is_empty() {
                    debug!(tag, skipped = body.len() - body.position(), "skipped trailing entity bytes");
                }
                table.insert(entity)?;
            }
            Err(Error::UnknownEntityType { tag }) => {
                warn!(tag, length, "skipped entity of unknown type");
                warnings.push(LoadWarning::UnknownEntityType { tag, length });
            }
            Err(e) => return Err(e),
        }
    }

    if !r.has(STAFF_PATROL_PER_ENTITY) {
        let mut entries: Vec<PatrolEntry> = Vec::new();
        rw_vec(r, &mut entries)?;
        legacy.patrol_areas = entries.into_iter().map(|e| (e.staff, e.area)).collect();
    }
    Ok(table)
}

/// Write every chunk of `park` in the encoding of `version`.
pub(crate) fn encode(
    container: &mut ContainerWriter,
    park: &mut ParkState,
    packed: &mut Vec<ObjectDefinition>,
    preview: Option<&mut PreviewImage>,
    version: u32,
) -> Result<()> {
    write_chunk(container, ChunkId::Authoring, version, |w| park.authoring.persist(w))?;
    write_chunk(container, ChunkId::Objects, version, |w| park.objects.persist(w))?;
    write_chunk(container, ChunkId::Scenario, version, |w| park.scenario.persist(w))?;
    write_chunk(container, ChunkId::General, version, |w| park.general.persist(w))?;
    write_chunk(container, ChunkId::Park, version, |w| park.park.persist(w))?;
    write_chunk(container, ChunkId::Research, version, |w| park.research.persist(w))?;
    write_chunk(container, ChunkId::Tiles, version, |w| park.map.persist(w))?;
    write_chunk(container, ChunkId::Entities, version, |w| {
        write_entities(w, &mut park.entities, &park.legacy)
    })?;
    write_chunk(container, ChunkId::Rides, version, |w| park.rides.persist(w))?;

    if version >= PEEP_NAMES_AS_OBJECTS {
        write_chunk(container, ChunkId::PeepNames, version, |w| park.peep_names.persist(w))?;
    } else if !park.peep_names.is_empty() {
        return Err(Error::InvalidData(format!("version {version} files have no peep name table")));
    }

    if !packed.is_empty() {
        if version < PACKED_OBJECTS_CHUNK {
            return Err(Error::InvalidData(format!("version {version} files cannot carry objects")));
        }
        write_chunk(container, ChunkId::PackedObjects, version, |w| rw_vec(w, packed))?;
    }

    if let Some(preview) = preview {
        if version < PREVIEW_IMAGE_CHUNK {
            return Err(Error::InvalidData(format!("version {version} files cannot carry a preview")));
        }
        write_chunk(container, ChunkId::Preview, version, |w| preview.persist(w))?;
    }
    Ok(())
}

/// Read every chunk of an opened container.
pub(crate) fn decode(container: &ContainerReader) -> Result<Decoded> {
    let mut decoded = Decoded::default();
    let park = &mut decoded.park;

    park.authoring = read_optional(container, ChunkId::Authoring)?;
    park.objects = read_value(container, ChunkId::Objects)?;
    park.scenario = read_optional(container, ChunkId::Scenario)?;
    park.general = read_value(container, ChunkId::General)?;
    park.park = read_optional(container, ChunkId::Park)?;
    park.research = read_optional(container, ChunkId::Research)?;
    park.map = read_value(container, ChunkId::Tiles)?;
    park.entities = read_chunk(ChunkId::Entities, container.require(ChunkId::Entities)?, |r| {
        read_entities(r, &mut park.legacy, &mut decoded.warnings)
    })?;
    park.rides = read_value(container, ChunkId::Rides)?;
    park.peep_names = read_optional(container, ChunkId::PeepNames)?;

    if let Some(reader) = container.chunk_reader(ChunkId::PackedObjects) {
        decoded.packed = read_chunk(ChunkId::PackedObjects, reader, |r| {
            let mut packed = Vec::new();
            rw_vec(r, &mut packed)?;
            Ok(packed)
        })?;
    }
    if let Some(reader) = container.chunk_reader(ChunkId::Preview) {
        decoded.preview = read_chunk(ChunkId::Preview, reader, |r| {
            let mut preview = PreviewImage::default();
            preview.persist(r)?;
            Ok(Some(preview))
        })?;
    }
    Ok(decoded)
}
