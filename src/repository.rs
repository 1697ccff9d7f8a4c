//! Object definitions available to the running build.

use std::collections::BTreeMap;

use crate::codec::{Persist, Stream};
use crate::error::{Error, Result};
use crate::state::object::{ObjectId, ObjectKind};

/// Terrain surface objects replacing the builtin style indices of old files,
/// in index order
pub const LEGACY_TERRAIN_SURFACES: &[&str] = &[
    "rct2.terrain_surface.grass",
    "rct2.terrain_surface.sand",
    "rct2.terrain_surface.dirt",
    "rct2.terrain_surface.rock",
    "rct2.terrain_surface.martian",
    "rct2.terrain_surface.chequerboard",
    "rct2.terrain_surface.grass_clumps",
    "rct2.terrain_surface.ice",
    "rct2.terrain_surface.grid_red",
    "rct2.terrain_surface.grid_yellow",
    "rct2.terrain_surface.grid_purple",
    "rct2.terrain_surface.grid_green",
    "rct2.terrain_surface.sand_red",
    "rct2.terrain_surface.sand_brown",
];

/// Terrain edge objects, in legacy index order
pub const LEGACY_TERRAIN_EDGES: &[&str] = &[
    "rct2.terrain_edge.rock",
    "rct2.terrain_edge.wood_red",
    "rct2.terrain_edge.wood_black",
    "rct2.terrain_edge.ice",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ObjectOrigin {
    /// Shipped with every installation; never embedded in saves
    #[default]
    Builtin = 0,
    /// Optional pack or user content; embedded so the save is self-contained
    Custom = 1,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDefinition {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub origin: ObjectOrigin,
    pub data: Vec<u8>,
}

impl ObjectDefinition {
    pub fn builtin(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self { id: ObjectId::new(id), kind, origin: ObjectOrigin::Builtin, data: Vec::new() }
    }

    pub fn custom(kind: ObjectKind, id: impl Into<String>, data: Vec<u8>) -> Self {
        Self { id: ObjectId::new(id), kind, origin: ObjectOrigin::Custom, data }
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == ObjectOrigin::Builtin
    }
}

impl Persist for ObjectDefinition {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;
        let mut kind = self.kind as u8;
        s.rw_u8(&mut kind)?;
        self.kind = ObjectKind::from_u8(kind)
            .ok_or_else(|| Error::InvalidData(format!("unknown object kind {kind}")))?;
        let mut origin = self.origin as u8;
        s.rw_u8(&mut origin)?;
        self.origin = match origin {
            0 => ObjectOrigin::Builtin,
            1 => ObjectOrigin::Custom,
            _ => return Err(Error::InvalidData(format!("unknown object origin {origin}"))),
        };
        s.rw_bytes(&mut self.data)
    }
}

/// Resolves object identifiers to definitions
pub trait ObjectRepository {
    fn find(&self, id: &ObjectId) -> Option<&ObjectDefinition>;
}

/// Repository held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    objects: BTreeMap<ObjectId, ObjectDefinition>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository holding the builtin terrain set
    pub fn with_builtins() -> Self {
        let mut repo = Self::new();
        for id in LEGACY_TERRAIN_SURFACES {
            repo.insert(ObjectDefinition::builtin(ObjectKind::TerrainSurface, *id));
        }
        for id in LEGACY_TERRAIN_EDGES {
            repo.insert(ObjectDefinition::builtin(ObjectKind::TerrainEdge, *id));
        }
        repo
    }

    pub fn insert(&mut self, definition: ObjectDefinition) -> Option<ObjectDefinition> {
        self.objects.insert(definition.id.clone(), definition)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectRepository for InMemoryRepository {
    fn find(&self, id: &ObjectId) -> Option<&ObjectDefinition> {
        self.objects.get(id)
    }
}

/// A repository with definitions carried alongside a park layered under it.
///
/// The base repository wins; the extra definitions only fill gaps, such as
/// objects embedded in a file that the installation no longer has.
pub struct Overlay<'a> {
    base: &'a dyn ObjectRepository,
    extra: &'a [ObjectDefinition],
}

impl<'a> Overlay<'a> {
    pub fn new(base: &'a dyn ObjectRepository, extra: &'a [ObjectDefinition]) -> Self {
        Self { base, extra }
    }
}

impl ObjectRepository for Overlay<'_> {
    fn find(&self, id: &ObjectId) -> Option<&ObjectDefinition> {
        self.base.find(id).or_else(|| self.extra.iter().find(|def| &def.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ChunkReader, ChunkWriter};
    use crate::migrate::gates::CURRENT_VERSION;

    #[test]
    fn test_builtins_cover_legacy_terrain() {
        let repo = InMemoryRepository::with_builtins();
        assert_eq!(repo.len(), LEGACY_TERRAIN_SURFACES.len() + LEGACY_TERRAIN_EDGES.len());
        let grass = repo.find(&ObjectId::new("rct2.terrain_surface.grass")).unwrap();
        assert_eq!(grass.kind, ObjectKind::TerrainSurface);
        assert!(grass.is_builtin());
        assert!(repo.find(&ObjectId::new("rct2.ride.bmvd")).is_none());
    }

    #[test]
    fn test_definition_persist_roundtrip() {
        let mut def = ObjectDefinition::custom(ObjectKind::Ride, "custom.ride.drop_tower", vec![1, 2, 3, 4]);
        let mut writer = ChunkWriter::new();
        def.persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut decoded = ObjectDefinition::default();
        decoded.persist(&mut ChunkReader::new(&bytes, CURRENT_VERSION)).unwrap();
        assert_eq!(decoded, def);
    }

    #[test]
    fn test_overlay_prefers_base_and_fills_gaps() {
        let mut repo = InMemoryRepository::with_builtins();
        repo.insert(ObjectDefinition::custom(ObjectKind::Ride, "custom.ride.drop_tower", vec![1]));
        let carried = [
            ObjectDefinition::custom(ObjectKind::Ride, "custom.ride.drop_tower", vec![9]),
            ObjectDefinition::custom(ObjectKind::Ride, "custom.ride.zipper", vec![2]),
        ];
        let overlay = Overlay::new(&repo, &carried);

        assert_eq!(overlay.find(&ObjectId::new("custom.ride.drop_tower")).unwrap().data, vec![1]);
        assert_eq!(overlay.find(&ObjectId::new("custom.ride.zipper")).unwrap().data, vec![2]);
        assert!(overlay.find(&ObjectId::new("rct2.terrain_edge.ice")).unwrap().is_builtin());
        assert!(overlay.find(&ObjectId::new("custom.ride.lost")).is_none());
    }
}
