use std::collections::BTreeMap;

use crate::codec::{checked_len, Persist, Stream};
use crate::error::{Error, Result};

/// Object definition categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum ObjectKind {
    #[default]
    Ride = 0,
    SmallScenery = 1,
    Footpath = 2,
    TerrainSurface = 3,
    TerrainEdge = 4,
    ParkEntrance = 5,
    Water = 6,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Ride,
        ObjectKind::SmallScenery,
        ObjectKind::Footpath,
        ObjectKind::TerrainSurface,
        ObjectKind::TerrainEdge,
        ObjectKind::ParkEntrance,
        ObjectKind::Water,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| *k as u8 == v)
    }
}

/// Stable textual identifier of an object definition, e.g. `rct2.ride.bmvd`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Persist for ObjectId {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_string(&mut self.0)
    }
}

/// Index into the per-kind table of the object list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectIndex(pub u16);

impl Persist for ObjectIndex {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u16(&mut self.0)
    }
}

/// A typed reference into the object list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub index: ObjectIndex,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, index: ObjectIndex) -> Self {
        Self { kind, index }
    }
}

/// Entries a single kind's table may hold
pub const MAX_OBJECTS_PER_KIND: usize = u16::MAX as usize;

/// Objects loaded into the park, one table per kind.
///
/// Tiles, rides and research refer to objects by `(kind, index)`; the list
/// maps those back to identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectList {
    tables: BTreeMap<ObjectKind, Vec<ObjectId>>,
}

impl ObjectList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` under `kind`, returning the existing index if it is already loaded.
    ///
    /// Fails once the kind's table holds [`MAX_OBJECTS_PER_KIND`] entries.
    pub fn add(&mut self, kind: ObjectKind, id: ObjectId) -> Result<ObjectIndex> {
        if let Some(index) = self.index_of(kind, &id) {
            return Ok(index);
        }
        let table = self.tables.entry(kind).or_default();
        if table.len() >= MAX_OBJECTS_PER_KIND {
            return Err(Error::InvalidData(format!("{kind:?} table is full, cannot add {id}")));
        }
        table.push(id);
        Ok(ObjectIndex(checked_len(table.len() - 1, "object index")?))
    }

    pub fn get(&self, r: ObjectRef) -> Option<&ObjectId> {
        self.tables.get(&r.kind)?.get(r.index.0 as usize)
    }

    pub fn index_of(&self, kind: ObjectKind, id: &ObjectId) -> Option<ObjectIndex> {
        self.tables
            .get(&kind)?
            .iter()
            .position(|existing| existing == id)
            .map(|pos| ObjectIndex(pos as u16))
    }

    pub fn table(&self, kind: ObjectKind) -> &[ObjectId] {
        self.tables.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectRef, &ObjectId)> {
        self.tables.iter().flat_map(|(kind, ids)| {
            ids.iter()
                .enumerate()
                .map(move |(i, id)| (ObjectRef::new(*kind, ObjectIndex(i as u16)), id))
        })
    }
}

impl Persist for ObjectList {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        let mut kind_count = self.tables.len() as u32;
        s.rw_u32(&mut kind_count)?;

        if s.is_reading() {
            self.tables.clear();
            for _ in 0..kind_count {
                let mut raw_kind = 0u8;
                s.rw_u8(&mut raw_kind)?;
                let kind = ObjectKind::from_u8(raw_kind)
                    .ok_or_else(|| Error::InvalidData(format!("unknown object kind {raw_kind}")))?;
                let mut ids = Vec::new();
                crate::codec::rw_vec(s, &mut ids)?;
                if ids.len() > MAX_OBJECTS_PER_KIND {
                    return Err(Error::InvalidData(format!("too many {kind:?} objects")));
                }
                if self.tables.insert(kind, ids).is_some() {
                    return Err(Error::InvalidData(format!("object kind {kind:?} listed twice")));
                }
            }
        } else {
            for (kind, ids) in self.tables.iter_mut() {
                let mut raw_kind = *kind as u8;
                s.rw_u8(&mut raw_kind)?;
                crate::codec::rw_vec(s, ids)?;
            }
        }
        Ok(())
    }
}
