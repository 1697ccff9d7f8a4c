use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use crate::codec::{Persist, Stream};
use crate::error::Result;
use crate::state::entity::{Entity, EntityId, EntityTable, GuestName, PatrolArea};
use crate::state::names::{NameId, PeepNameTable};
use crate::state::object::{ObjectIndex, ObjectList};
use crate::state::research::ResearchState;
use crate::state::ride::{RideId, RideTable, SpecialElements};
use crate::state::tile::{track_type, TerrainRef, TileElement, TileMap};

/// Which build wrote the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Authoring {
    pub engine: String,
    pub author: String,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
}

impl Persist for Authoring {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_string(&mut self.engine)?;
        s.rw_string(&mut self.author)?;
        s.rw_u64(&mut self.timestamp)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objective {
    pub kind: u8,
    pub year: u8,
    pub guests: u16,
    pub currency: i32,
}

impl Persist for Objective {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u8(&mut self.kind)?;
        s.rw_u8(&mut self.year)?;
        s.rw_u16(&mut self.guests)?;
        s.rw_i32(&mut self.currency)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub details: String,
    pub category: u8,
    pub objective: Objective,
}

impl Persist for Scenario {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_string(&mut self.name)?;
        s.rw_string(&mut self.details)?;
        s.rw_u8(&mut self.category)?;
        self.objective.persist(s)
    }
}

/// Clock, random state and finances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct General {
    pub ticks: u32,
    pub month_year: u32,
    pub month_tick: u16,
    pub rng_state: [u32; 2],
    pub cash: i64,
    pub loan: i64,
    pub max_loan: i64,
}

impl Persist for General {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u32(&mut self.ticks)?;
        s.rw_u32(&mut self.month_year)?;
        s.rw_u16(&mut self.month_tick)?;
        s.rw_u32(&mut self.rng_state[0])?;
        s.rw_u32(&mut self.rng_state[1])?;
        s.rw_i64(&mut self.cash)?;
        s.rw_i64(&mut self.loan)?;
        s.rw_i64(&mut self.max_loan)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParkFlags: u32 {
        const OPEN = 1 << 0;
        const NO_MONEY = 1 << 1;
        const FORBID_LANDSCAPE_CHANGES = 1 << 2;
        const FORBID_TREE_REMOVAL = 1 << 3;
        const FORBID_HIGH_CONSTRUCTION = 1 << 4;
        const PREF_LESS_INTENSE_RIDES = 1 << 5;
        const UNLOCK_ALL_PRICES = 1 << 6;
        const DIFFICULT_GUEST_GENERATION = 1 << 7;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParkInfo {
    pub name: String,
    pub rating: i16,
    pub entrance_fee: u16,
    pub flags: ParkFlags,
    pub entrance: ObjectIndex,
    pub water: ObjectIndex,
}

impl Persist for ParkInfo {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_string(&mut self.name)?;
        s.rw_i16(&mut self.rating)?;
        s.rw_u16(&mut self.entrance_fee)?;
        let mut flags = self.flags.bits();
        s.rw_u32(&mut flags)?;
        self.flags = ParkFlags::from_bits_retain(flags);
        self.entrance.persist(s)?;
        self.water.persist(s)
    }
}

/// Data decoded from old files that has no place in the current model.
/// Migration must leave this empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyData {
    /// Global patrol table, keyed by staff id
    pub patrol_areas: Vec<(EntityId, PatrolArea)>,
}

impl LegacyData {
    pub fn is_empty(&self) -> bool {
        self.patrol_areas.is_empty()
    }
}

/// A reference that pointed at nothing after decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dangling {
    /// Cleared
    StaffEscort { staff: EntityId, guest: EntityId },
    /// Cleared
    GuestRide { guest: EntityId, ride: RideId },
    /// Replaced by a synthesized name entry
    GuestName { guest: EntityId, name: NameId },
    /// The vehicle is removed along with its missing ride
    VehicleRide { vehicle: EntityId, ride: RideId },
    /// Left in place; the piece stays on the map without an owner
    TrackRide { ride: RideId },
}

impl Dangling {
    /// True if relinking dropped the reference
    pub fn cleared(&self) -> bool {
        !matches!(self, Dangling::TrackRide { .. })
    }
}

impl fmt::Display for Dangling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dangling::StaffEscort { staff, guest } => {
                write!(f, "staff {} escorts missing guest {}", staff.0, guest.0)
            }
            Dangling::GuestRide { guest, ride } => {
                write!(f, "guest {} is on missing ride {}", guest.0, ride.0)
            }
            Dangling::GuestName { guest, name } => {
                write!(f, "guest {} has missing name entry {}", guest.0, name.0)
            }
            Dangling::VehicleRide { vehicle, ride } => {
                write!(f, "vehicle {} belongs to missing ride {}", vehicle.0, ride.0)
            }
            Dangling::TrackRide { ride } => write!(f, "track piece belongs to missing ride {}", ride.0),
        }
    }
}

/// The complete mutable state of a park
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParkState {
    pub authoring: Authoring,
    pub scenario: Scenario,
    pub general: General,
    pub park: ParkInfo,
    pub objects: ObjectList,
    pub research: ResearchState,
    pub map: TileMap,
    pub entities: EntityTable,
    pub rides: RideTable,
    pub peep_names: PeepNameTable,
    pub legacy: LegacyData,
}

impl ParkState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            map: TileMap::new(width, height),
            ..Default::default()
        }
    }

    /// Describe the first old-format representation still present, if any.
    pub fn unmigrated(&self) -> Option<String> {
        if let Some((id, _)) = self.legacy.patrol_areas.first() {
            return Some(format!("legacy patrol area for staff {}", id.0));
        }
        for surface in self.map.elements().filter_map(|e| match e {
            TileElement::Surface(surface) => Some(surface),
            _ => None,
        }) {
            for terrain in [surface.terrain, surface.edge] {
                if let TerrainRef::Legacy(style) = terrain {
                    return Some(format!("builtin terrain style {style}"));
                }
            }
        }
        if let Some(ride) = self
            .rides
            .iter()
            .find(|r| matches!(r.stats.special, SpecialElements::Packed(_)))
        {
            return Some(format!("packed statistics on ride {}", ride.id.0));
        }
        if let Some(guest) = self.entities.guests().find(|g| matches!(g.name, GuestName::Baked(_))) {
            return Some(format!("baked name on guest {}", guest.id.0));
        }
        if let Some(track) = self
            .map
            .track_elements()
            .find(|t| t.track_type == track_type::BLOCK_BRAKES && t.brake_speed.is_none())
        {
            return Some(format!("block brakes without a speed on ride {}", track.ride.0));
        }
        None
    }

    /// Check every cross reference by id.
    ///
    /// Staff escorts and guest rides pointing at nothing are cleared, guests
    /// with a missing name entry get a synthesized one, and vehicles of
    /// missing rides are removed. Track pieces of missing rides are only
    /// reported.
    pub fn relink(&mut self) -> Vec<Dangling> {
        let mut dangling = Vec::new();
        let guest_ids: BTreeSet<EntityId> = self.entities.guests().map(|g| g.id).collect();
        let mut orphan_vehicles = Vec::new();

        for entity in self.entities.iter_mut() {
            match entity {
                Entity::Staff(staff) => {
                    if let Some(guest) = staff.escorting {
                        if !guest_ids.contains(&guest) {
                            dangling.push(Dangling::StaffEscort { staff: staff.id, guest });
                            staff.escorting = None;
                        }
                    }
                }
                Entity::Guest(g) => {
                    if let Some(ride) = g.current_ride {
                        if !self.rides.contains(ride) {
                            dangling.push(Dangling::GuestRide { guest: g.id, ride });
                            g.current_ride = None;
                        }
                    }
                    if let GuestName::Object(name) = g.name {
                        if self.peep_names.get(name).is_none() {
                            dangling.push(Dangling::GuestName { guest: g.id, name });
                            g.name = GuestName::Object(self.peep_names.intern(&format!("Guest {}", g.id.0)));
                        }
                    }
                }
                Entity::Vehicle(v) => {
                    if !self.rides.contains(v.ride) {
                        dangling.push(Dangling::VehicleRide { vehicle: v.id, ride: v.ride });
                        orphan_vehicles.push(v.id);
                    }
                }
                _ => {}
            }
        }
        for id in orphan_vehicles {
            self.entities.remove(id);
        }

        let missing_rides: BTreeSet<RideId> = self
            .map
            .track_elements()
            .map(|t| t.ride)
            .filter(|ride| !self.rides.contains(*ride))
            .collect();
        dangling.extend(missing_rides.into_iter().map(|ride| Dangling::TrackRide { ride }));
        dangling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::entity::{Guest, Staff, StaffType, Vehicle};
    use crate::state::ride::Ride;
    use crate::state::tile::TrackElement;

    fn park() -> ParkState {
        let mut park = ParkState::new(2, 2);
        park.rides.insert(Ride { id: RideId(0), name: "Twister".into(), ..Default::default() });
        let name = park.peep_names.intern("Ann T.");
        park.entities
            .insert(Guest {
                id: EntityId(1),
                name: GuestName::Object(name),
                current_ride: Some(RideId(0)),
                ..Default::default()
            })
            .unwrap();
        park.entities
            .insert(Staff {
                id: EntityId(2),
                staff_type: StaffType::Security,
                escorting: Some(EntityId(1)),
                ..Default::default()
            })
            .unwrap();
        park
    }

    #[test]
    fn test_fresh_park_is_migrated() {
        assert_eq!(park().unmigrated(), None);
    }

    #[test]
    fn test_unmigrated_reports_legacy_parts() {
        let mut p = park();
        p.legacy.patrol_areas.push((EntityId(2), PatrolArea::default()));
        assert!(p.unmigrated().unwrap().contains("patrol"));

        let mut p = park();
        if let Some(TileElement::Surface(surface)) = p.map.tile_mut(0, 0).unwrap().first_mut() {
            surface.edge = TerrainRef::Legacy(3);
        }
        assert!(p.unmigrated().unwrap().contains("terrain"));

        let mut p = park();
        p.map.tile_mut(1, 0).unwrap().push(TileElement::Track(TrackElement {
            track_type: track_type::BLOCK_BRAKES,
            brake_speed: None,
            ..Default::default()
        }));
        assert!(p.unmigrated().unwrap().contains("block brakes"));
    }

    #[test]
    fn test_relink_intact_references() {
        let mut p = park();
        assert!(p.relink().is_empty());
        assert_eq!(p, park());
    }

    #[test]
    fn test_relink_clears_dangling_references() {
        let mut p = park();
        p.rides = RideTable::new();
        p.map.tile_mut(1, 1).unwrap().push(TileElement::Track(TrackElement {
            ride: RideId(5),
            ..Default::default()
        }));
        p.map.tile_mut(0, 1).unwrap().push(TileElement::Track(TrackElement {
            ride: RideId(5),
            ..Default::default()
        }));

        let dangling = p.relink();
        assert_eq!(
            dangling,
            vec![
                Dangling::GuestRide { guest: EntityId(1), ride: RideId(0) },
                Dangling::TrackRide { ride: RideId(5) },
            ]
        );
        assert!(p.entities.guests().all(|g| g.current_ride.is_none()));
        assert!(dangling[0].cleared());
        assert!(!dangling[1].cleared());
    }

    #[test]
    fn test_relink_escort_of_missing_guest() {
        let mut p = ParkState::default();
        p.entities
            .insert(Staff { id: EntityId(2), escorting: Some(EntityId(40)), ..Default::default() })
            .unwrap();
        let dangling = p.relink();
        assert_eq!(dangling, vec![Dangling::StaffEscort { staff: EntityId(2), guest: EntityId(40) }]);
        assert_eq!(p.entities.staff().next().unwrap().escorting, None);
    }

    #[test]
    fn test_relink_synthesizes_missing_guest_name() {
        let mut p = park();
        p.entities.insert(Guest { id: EntityId(3), name: GuestName::Object(NameId(7)), ..Default::default() }).unwrap();

        let dangling = p.relink();
        assert_eq!(dangling, vec![Dangling::GuestName { guest: EntityId(3), name: NameId(7) }]);
        assert!(dangling[0].cleared());
        match p.entities.get(EntityId(3)) {
            Some(Entity::Guest(g)) => assert_eq!(g.name, GuestName::Object(NameId(1))),
            other => panic!("unexpected entity {other:?}"),
        }
        assert_eq!(p.peep_names.get(NameId(1)), Some("Guest 3"));
        assert!(p.relink().is_empty());
    }

    #[test]
    fn test_relink_removes_vehicles_of_missing_rides() {
        let mut p = park();
        p.entities.insert(Vehicle { id: EntityId(4), ride: RideId(0), ..Default::default() }).unwrap();
        p.entities.insert(Vehicle { id: EntityId(5), ride: RideId(99), ..Default::default() }).unwrap();

        let dangling = p.relink();
        assert_eq!(dangling, vec![Dangling::VehicleRide { vehicle: EntityId(5), ride: RideId(99) }]);
        assert!(dangling[0].cleared());
        assert!(p.entities.contains(EntityId(4)));
        assert!(!p.entities.contains(EntityId(5)));
    }
}
