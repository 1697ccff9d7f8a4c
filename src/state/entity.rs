//! Park entities and their persisted representation.
//!
//! Entities are a closed set of kinds. Each record in the entities chunk is
//! prefixed by its kind tag and byte length; decoding goes through
//! [`ENTITY_CODECS`], a table keyed by the tag, so a tag this build does not
//! know surfaces as [`Error::UnknownEntityType`] and the caller can skip the
//! record by its length.

use bitflags::bitflags;
use indexmap::IndexMap;
use serde::Serialize;

use crate::codec::{rw_option, rw_vec, ChunkReader, Persist, Stream};
use crate::error::{Error, Result};
use crate::migrate::gates::{PEEP_NAMES_AS_OBJECTS, STAFF_PATROL_PER_ENTITY, WIDE_GUEST_CASH};
use crate::state::names::NameId;
use crate::state::ride::RideId;

/// Stable entity identifier, used for every cross-entity reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct EntityId(pub u32);

impl Persist for EntityId {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u32(&mut self.0)
    }
}

/// Position in world units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coords {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coords {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl Persist for Coords {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_i32(&mut self.x)?;
        s.rw_i32(&mut self.y)?;
        s.rw_i32(&mut self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntityKind {
    Guest = 0,
    Staff = 1,
    Vehicle = 2,
    Litter = 3,
    Balloon = 4,
    Duck = 5,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GuestFlags: u32 {
        const LEAVING_PARK = 1 << 0;
        const SLOW_WALK = 1 << 1;
        const TRACKING = 1 << 2;
        const HAS_MAP = 1 << 3;
        const HAS_UMBRELLA = 1 << 4;
        const NAUSEOUS = 1 << 5;
    }
}

/// Guest name, either text baked into the record by older files or an entry
/// in the park's peep name table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestName {
    Baked(String),
    Object(NameId),
}

impl Default for GuestName {
    fn default() -> Self {
        GuestName::Object(NameId::default())
    }
}

impl Persist for GuestName {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        if s.has(PEEP_NAMES_AS_OBJECTS) {
            let mut id = match self {
                GuestName::Object(id) => id.0,
                GuestName::Baked(name) if !s.is_reading() => {
                    return Err(Error::UnmigratedState(format!("baked guest name {name:?}")));
                }
                GuestName::Baked(_) => 0,
            };
            s.rw_u32(&mut id)?;
            *self = GuestName::Object(NameId(id));
        } else {
            let mut name = match self {
                GuestName::Baked(name) => std::mem::take(name),
                GuestName::Object(_) if !s.is_reading() => {
                    return Err(Error::InvalidData("name object in a baked-name file".into()));
                }
                GuestName::Object(_) => String::new(),
            };
            s.rw_string(&mut name)?;
            *self = GuestName::Baked(name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guest {
    pub id: EntityId,
    pub position: Coords,
    pub name: GuestName,
    /// Cash in tenths of the currency unit
    pub cash: i32,
    pub happiness: u8,
    pub current_ride: Option<RideId>,
    pub flags: GuestFlags,
}

impl Persist for Guest {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;
        self.position.persist(s)?;
        self.name.persist(s)?;
        if s.has(WIDE_GUEST_CASH) {
            s.rw_i32(&mut self.cash)?;
        } else {
            let mut cash = i16::try_from(self.cash)
                .map_err(|_| Error::InvalidData(format!("guest cash {} exceeds 16 bits", self.cash)))?;
            s.rw_i16(&mut cash)?;
            self.cash = cash.into();
        }
        s.rw_u8(&mut self.happiness)?;
        rw_option(s, &mut self.current_ride)?;
        let mut flags = self.flags.bits();
        s.rw_u32(&mut flags)?;
        self.flags = GuestFlags::from_bits_retain(flags);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StaffType {
    #[default]
    Handyman = 0,
    Mechanic = 1,
    Security = 2,
    Entertainer = 3,
}

impl StaffType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(StaffType::Handyman),
            1 => Some(StaffType::Mechanic),
            2 => Some(StaffType::Security),
            3 => Some(StaffType::Entertainer),
            _ => None,
        }
    }
}

/// One 4x4 tile block of a patrol area
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PatrolCell {
    pub x: u16,
    pub y: u16,
}

impl Persist for PatrolCell {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u16(&mut self.x)?;
        s.rw_u16(&mut self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatrolArea {
    pub cells: Vec<PatrolCell>,
}

impl PatrolArea {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Persist for PatrolArea {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        rw_vec(s, &mut self.cells)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Staff {
    pub id: EntityId,
    pub position: Coords,
    pub staff_type: StaffType,
    pub name: String,
    pub wage: u16,
    /// Guest being escorted out of the park by security
    pub escorting: Option<EntityId>,
    pub patrol_area: PatrolArea,
}

impl Persist for Staff {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;
        self.position.persist(s)?;
        let mut staff_type = self.staff_type as u8;
        s.rw_u8(&mut staff_type)?;
        self.staff_type = StaffType::from_u8(staff_type)
            .ok_or_else(|| Error::InvalidData(format!("unknown staff type {staff_type}")))?;
        s.rw_string(&mut self.name)?;
        s.rw_u16(&mut self.wage)?;
        rw_option(s, &mut self.escorting)?;
        if s.has(STAFF_PATROL_PER_ENTITY) {
            self.patrol_area.persist(s)?;
        } else if !s.is_reading() && !self.patrol_area.is_empty() {
            // Older files keep patrol areas in a separate table
            return Err(Error::InvalidData("per-staff patrol area in a legacy file".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vehicle {
    pub id: EntityId,
    pub position: Coords,
    pub ride: RideId,
    pub car_index: u8,
    pub velocity: i32,
}

impl Persist for Vehicle {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;
        self.position.persist(s)?;
        self.ride.persist(s)?;
        s.rw_u8(&mut self.car_index)?;
        s.rw_i32(&mut self.velocity)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Litter {
    pub id: EntityId,
    pub position: Coords,
    pub litter_type: u8,
    pub creation_tick: u32,
}

impl Persist for Litter {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;
        self.position.persist(s)?;
        s.rw_u8(&mut self.litter_type)?;
        s.rw_u32(&mut self.creation_tick)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balloon {
    pub id: EntityId,
    pub position: Coords,
    pub colour: u8,
    pub popped: bool,
}

impl Persist for Balloon {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;
        self.position.persist(s)?;
        s.rw_u8(&mut self.colour)?;
        s.rw_bool(&mut self.popped)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Duck {
    pub id: EntityId,
    pub position: Coords,
    pub state: u8,
}

impl Persist for Duck {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;
        self.position.persist(s)?;
        s.rw_u8(&mut self.state)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Guest(Guest),
    Staff(Staff),
    Vehicle(Vehicle),
    Litter(Litter),
    Balloon(Balloon),
    Duck(Duck),
}

macro_rules! impl_into_entity {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for Entity {
                fn from(v: $ty) -> Self {
                    Entity::$ty(v)
                }
            }
        )*
    };
}

impl_into_entity!(Guest, Staff, Vehicle, Litter, Balloon, Duck);

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Guest(e) => e.id,
            Entity::Staff(e) => e.id,
            Entity::Vehicle(e) => e.id,
            Entity::Litter(e) => e.id,
            Entity::Balloon(e) => e.id,
            Entity::Duck(e) => e.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Guest(_) => EntityKind::Guest,
            Entity::Staff(_) => EntityKind::Staff,
            Entity::Vehicle(_) => EntityKind::Vehicle,
            Entity::Litter(_) => EntityKind::Litter,
            Entity::Balloon(_) => EntityKind::Balloon,
            Entity::Duck(_) => EntityKind::Duck,
        }
    }

    /// Decode one record body for the kind `tag`.
    pub fn decode(tag: u8, r: &mut ChunkReader<'_>) -> Result<Entity> {
        let codec = ENTITY_CODECS
            .iter()
            .find(|c| c.kind as u8 == tag)
            .ok_or(Error::UnknownEntityType { tag })?;
        (codec.read)(r)
    }
}

impl Persist for Entity {
    /// Record body only; the tag and length framing belong to the chunk.
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        match self {
            Entity::Guest(e) => e.persist(s),
            Entity::Staff(e) => e.persist(s),
            Entity::Vehicle(e) => e.persist(s),
            Entity::Litter(e) => e.persist(s),
            Entity::Balloon(e) => e.persist(s),
            Entity::Duck(e) => e.persist(s),
        }
    }
}

pub struct EntityCodec {
    pub kind: EntityKind,
    pub read: fn(&mut ChunkReader<'_>) -> Result<Entity>,
}

fn read_entity<T: Persist + Default + Into<Entity>>(r: &mut ChunkReader<'_>) -> Result<Entity> {
    let mut value = T::default();
    value.persist(r)?;
    Ok(value.into())
}

/// Decoders for every entity kind this build understands
pub const ENTITY_CODECS: &[EntityCodec] = &[
    EntityCodec { kind: EntityKind::Guest, read: read_entity::<Guest> },
    EntityCodec { kind: EntityKind::Staff, read: read_entity::<Staff> },
    EntityCodec { kind: EntityKind::Vehicle, read: read_entity::<Vehicle> },
    EntityCodec { kind: EntityKind::Litter, read: read_entity::<Litter> },
    EntityCodec { kind: EntityKind::Balloon, read: read_entity::<Balloon> },
    EntityCodec { kind: EntityKind::Duck, read: read_entity::<Duck> },
];

/// All entities of a park keyed by id, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTable {
    entities: IndexMap<EntityId, Entity>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Fails if the id is already taken.
    pub fn insert(&mut self, entity: impl Into<Entity>) -> Result<()> {
        let entity = entity.into();
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return Err(Error::InvalidData(format!("entity {} stored twice", id.0)));
        }
        self.entities.insert(id, entity);
        Ok(())
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.shift_remove(&id)
    }

    pub fn guests(&self) -> impl Iterator<Item = &Guest> {
        self.iter().filter_map(|e| match e {
            Entity::Guest(g) => Some(g),
            _ => None,
        })
    }

    pub fn guests_mut(&mut self) -> impl Iterator<Item = &mut Guest> {
        self.iter_mut().filter_map(|e| match e {
            Entity::Guest(g) => Some(g),
            _ => None,
        })
    }

    pub fn staff(&self) -> impl Iterator<Item = &Staff> {
        self.iter().filter_map(|e| match e {
            Entity::Staff(st) => Some(st),
            _ => None,
        })
    }

    pub fn staff_mut(&mut self) -> impl Iterator<Item = &mut Staff> {
        self.iter_mut().filter_map(|e| match e {
            Entity::Staff(st) => Some(st),
            _ => None,
        })
    }
}
