use crate::codec::{checked_len, rw_option, Persist, Stream};
use crate::error::{Error, Result};
use crate::migrate::gates::{BLOCK_BRAKE_SPEED, TERRAIN_STYLES_AS_OBJECTS};
use crate::state::object::ObjectIndex;
use crate::state::ride::RideId;

/// Track piece type ids used by the persistence layer
pub mod track_type {
    pub const FLAT: u16 = 0;
    pub const UP_25: u16 = 4;
    pub const DOWN_25: u16 = 14;
    pub const DOWN_25_TO_DOWN_60: u16 = 21;
    pub const BRAKES: u16 = 99;
    pub const LOG_FLUME_REVERSER: u16 = 118;
    pub const BLOCK_BRAKES: u16 = 216;
}

/// Speed given to block brakes saved before they stored one
pub const DEFAULT_BLOCK_BRAKE_SPEED: u8 = 2;

/// Terrain style of a surface element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainRef {
    /// Index into the builtin style list of files predating terrain objects
    Legacy(u8),
    Object(ObjectIndex),
}

impl Default for TerrainRef {
    fn default() -> Self {
        TerrainRef::Object(ObjectIndex::default())
    }
}

impl Persist for TerrainRef {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        if s.has(TERRAIN_STYLES_AS_OBJECTS) {
            let mut index = match *self {
                TerrainRef::Object(index) => index,
                TerrainRef::Legacy(style) if !s.is_reading() => {
                    return Err(Error::UnmigratedState(format!("builtin terrain style {style}")));
                }
                TerrainRef::Legacy(_) => ObjectIndex::default(),
            };
            index.persist(s)?;
            *self = TerrainRef::Object(index);
        } else {
            let mut style = match *self {
                TerrainRef::Legacy(style) => style,
                TerrainRef::Object(_) if !s.is_reading() => {
                    return Err(Error::InvalidData("terrain object in a pre-object file".into()));
                }
                TerrainRef::Object(_) => 0,
            };
            s.rw_u8(&mut style)?;
            *self = TerrainRef::Legacy(style);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceElement {
    pub base_height: u8,
    pub terrain: TerrainRef,
    pub edge: TerrainRef,
    pub water_height: u8,
}

impl Persist for SurfaceElement {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u8(&mut self.base_height)?;
        self.terrain.persist(s)?;
        self.edge.persist(s)?;
        s.rw_u8(&mut self.water_height)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathElement {
    pub base_height: u8,
    pub surface: ObjectIndex,
    pub is_queue: bool,
}

impl Persist for PathElement {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u8(&mut self.base_height)?;
        self.surface.persist(s)?;
        s.rw_bool(&mut self.is_queue)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackElement {
    pub base_height: u8,
    pub ride: RideId,
    pub track_type: u16,
    pub sequence: u8,
    pub brake_speed: Option<u8>,
}

impl Persist for TrackElement {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u8(&mut self.base_height)?;
        self.ride.persist(s)?;
        s.rw_u16(&mut self.track_type)?;
        s.rw_u8(&mut self.sequence)?;
        if s.has(BLOCK_BRAKE_SPEED) {
            rw_option(s, &mut self.brake_speed)?;
        } else if self.track_type == track_type::BRAKES {
            // Only plain brakes carried a speed
            let mut speed = self.brake_speed.unwrap_or_default();
            s.rw_u8(&mut speed)?;
            self.brake_speed = Some(speed);
        } else if s.is_reading() {
            self.brake_speed = None;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneryElement {
    pub base_height: u8,
    pub object: ObjectIndex,
    pub rotation: u8,
}

impl Persist for SceneryElement {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u8(&mut self.base_height)?;
        self.object.persist(s)?;
        s.rw_u8(&mut self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileElement {
    Surface(SurfaceElement),
    Path(PathElement),
    Track(TrackElement),
    Scenery(SceneryElement),
}

impl TileElement {
    fn tag(&self) -> u8 {
        match self {
            TileElement::Surface(_) => 0,
            TileElement::Path(_) => 1,
            TileElement::Track(_) => 2,
            TileElement::Scenery(_) => 3,
        }
    }
}

impl Default for TileElement {
    fn default() -> Self {
        TileElement::Surface(SurfaceElement::default())
    }
}

impl Persist for TileElement {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        let mut tag = self.tag();
        s.rw_u8(&mut tag)?;
        if s.is_reading() {
            *self = match tag {
                0 => TileElement::Surface(SurfaceElement::default()),
                1 => TileElement::Path(PathElement::default()),
                2 => TileElement::Track(TrackElement::default()),
                3 => TileElement::Scenery(SceneryElement::default()),
                _ => return Err(Error::InvalidData(format!("unknown tile element type {tag}"))),
            };
        }
        match self {
            TileElement::Surface(e) => e.persist(s),
            TileElement::Path(e) => e.persist(s),
            TileElement::Track(e) => e.persist(s),
            TileElement::Scenery(e) => e.persist(s),
        }
    }
}

/// Terrain grid, row-major, each tile holding a stack of elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileMap {
    width: u32,
    height: u32,
    tiles: Vec<Vec<TileElement>>,
}

impl TileMap {
    /// A map of bare surface tiles
    pub fn new(width: u32, height: u32) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            tiles: vec![vec![TileElement::default()]; count],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    pub fn tile(&self, x: u32, y: u32) -> Option<&[TileElement]> {
        self.index(x, y).map(|i| self.tiles[i].as_slice())
    }

    pub fn tile_mut(&mut self, x: u32, y: u32) -> Option<&mut Vec<TileElement>> {
        let i = self.index(x, y)?;
        Some(&mut self.tiles[i])
    }

    pub fn elements(&self) -> impl Iterator<Item = &TileElement> {
        self.tiles.iter().flatten()
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut TileElement> {
        self.tiles.iter_mut().flatten()
    }

    pub fn track_elements(&self) -> impl Iterator<Item = &TrackElement> {
        self.elements().filter_map(|e| match e {
            TileElement::Track(t) => Some(t),
            _ => None,
        })
    }

    pub fn track_elements_mut(&mut self) -> impl Iterator<Item = &mut TrackElement> {
        self.elements_mut().filter_map(|e| match e {
            TileElement::Track(t) => Some(t),
            _ => None,
        })
    }

    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut SurfaceElement> {
        self.elements_mut().filter_map(|e| match e {
            TileElement::Surface(surface) => Some(surface),
            _ => None,
        })
    }
}

impl Persist for TileMap {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u32(&mut self.width)?;
        s.rw_u32(&mut self.height)?;
        let count = (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| Error::InvalidData("map dimensions overflow".into()))?;

        if s.is_reading() {
            // Each tile is at least its u16 element count
            if count > s.remaining_hint() / 2 {
                return Err(Error::InvalidData(format!(
                    "{}x{} map does not fit in the tiles chunk",
                    self.width, self.height
                )));
            }
            self.tiles = vec![Vec::new(); count];
        }

        for tile in self.tiles.iter_mut() {
            let mut len: u16 = if s.is_reading() { 0 } else { checked_len(tile.len(), "tile element count")? };
            s.rw_u16(&mut len)?;
            if s.is_reading() {
                tile.clear();
                for _ in 0..len {
                    let mut element = TileElement::default();
                    element.persist(s)?;
                    tile.push(element);
                }
            } else {
                for element in tile.iter_mut() {
                    element.persist(s)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ChunkReader, ChunkWriter};
    use crate::migrate::gates::CURRENT_VERSION;

    fn sample_map() -> TileMap {
        let mut map = TileMap::new(2, 2);
        let tile = map.tile_mut(1, 0).unwrap();
        tile.push(TileElement::Path(PathElement { base_height: 14, surface: ObjectIndex(1), is_queue: true }));
        tile.push(TileElement::Track(TrackElement {
            base_height: 16,
            ride: RideId(3),
            track_type: track_type::BLOCK_BRAKES,
            sequence: 0,
            brake_speed: Some(4),
        }));
        map.tile_mut(0, 1).unwrap().push(TileElement::Scenery(SceneryElement {
            base_height: 14,
            object: ObjectIndex(2),
            rotation: 3,
        }));
        map
    }

    #[test]
    fn test_tile_map_roundtrip() {
        let map = sample_map();
        let mut writer = ChunkWriter::new();
        map.clone().persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut decoded = TileMap::default();
        let mut reader = ChunkReader::new(&bytes, CURRENT_VERSION);
        decoded.persist(&mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded, map);
        assert_eq!(decoded.track_elements().count(), 1);
    }

    #[test]
    fn test_out_of_range_tile_is_none() {
        let map = TileMap::new(3, 2);
        assert!(map.tile(2, 1).is_some());
        assert!(map.tile(3, 0).is_none());
        assert!(map.tile(0, 2).is_none());
    }

    #[test]
    fn test_huge_dimensions_rejected() {
        let mut writer = ChunkWriter::new();
        writer.rw_u32(&mut 100_000).unwrap();
        writer.rw_u32(&mut 100_000).unwrap();
        let bytes = writer.into_bytes();
        let mut map = TileMap::default();
        assert!(map.persist(&mut ChunkReader::new(&bytes, CURRENT_VERSION)).is_err());
    }

    #[test]
    fn test_legacy_terrain_read_before_terrain_objects() {
        let mut writer = ChunkWriter::at_version(TERRAIN_STYLES_AS_OBJECTS - 1);
        let mut surface = SurfaceElement {
            base_height: 7,
            terrain: TerrainRef::Legacy(2),
            edge: TerrainRef::Legacy(1),
            water_height: 0,
        };
        surface.persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes, vec![7, 2, 1, 0]);

        let mut decoded = SurfaceElement::default();
        decoded
            .persist(&mut ChunkReader::new(&bytes, TERRAIN_STYLES_AS_OBJECTS - 1))
            .unwrap();
        assert_eq!(decoded, surface);
    }

    #[test]
    fn test_current_writer_refuses_legacy_terrain() {
        let mut surface = SurfaceElement { terrain: TerrainRef::Legacy(0), ..Default::default() };
        let err = surface.persist(&mut ChunkWriter::new()).unwrap_err();
        assert!(matches!(err, Error::UnmigratedState(_)));
    }

    #[test]
    fn test_block_brakes_carry_no_speed_before_gate() {
        let version = BLOCK_BRAKE_SPEED - 1;
        let mut writer = ChunkWriter::at_version(version);
        let mut brakes = TrackElement { track_type: track_type::BRAKES, brake_speed: Some(5), ..Default::default() };
        let mut block = TrackElement { track_type: track_type::BLOCK_BRAKES, brake_speed: None, ..Default::default() };
        brakes.persist(&mut writer).unwrap();
        block.persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = ChunkReader::new(&bytes, version);
        let mut a = TrackElement::default();
        let mut b = TrackElement { brake_speed: Some(9), ..Default::default() };
        a.persist(&mut reader).unwrap();
        b.persist(&mut reader).unwrap();
        assert_eq!(a.brake_speed, Some(5));
        assert_eq!(b.brake_speed, None);
        assert!(reader.is_empty());
    }
}
