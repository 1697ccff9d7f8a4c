use indexmap::IndexMap;
use serde::Serialize;

use crate::codec::{checked_len, Persist, Stream};
use crate::error::{Error, Result};
use crate::migrate::gates::RIDE_STATS_SPLIT;
use crate::state::object::ObjectIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct RideId(pub u16);

impl Persist for RideId {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_u16(&mut self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RideType {
    #[default]
    SpiralRollerCoaster = 0,
    WoodenRollerCoaster = 1,
    LogFlume = 2,
    MiniGolf = 3,
    GoKarts = 4,
    MerryGoRound = 5,
    FerrisWheel = 6,
    FoodStall = 7,
    Toilets = 8,
}

impl RideType {
    pub const ALL: [RideType; 9] = [
        RideType::SpiralRollerCoaster,
        RideType::WoodenRollerCoaster,
        RideType::LogFlume,
        RideType::MiniGolf,
        RideType::GoKarts,
        RideType::MerryGoRound,
        RideType::FerrisWheel,
        RideType::FoodStall,
        RideType::Toilets,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u8 == v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RideStatus {
    #[default]
    Closed = 0,
    Open = 1,
    Testing = 2,
    Simulating = 3,
}

impl RideStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(RideStatus::Closed),
            1 => Some(RideStatus::Open),
            2 => Some(RideStatus::Testing),
            3 => Some(RideStatus::Simulating),
            _ => None,
        }
    }
}

/// Inversion, hole and shelter counts of a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialElements {
    /// Single byte of older files: low five bits are inversions (or holes
    /// for mini golf), the top three bits sheltered eighths
    Packed(u8),
    Split {
        inversions: u8,
        holes: u8,
        sheltered_eighths: u8,
    },
}

impl Default for SpecialElements {
    fn default() -> Self {
        SpecialElements::Split { inversions: 0, holes: 0, sheltered_eighths: 0 }
    }
}

impl Persist for SpecialElements {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        if s.has(RIDE_STATS_SPLIT) {
            let (mut inversions, mut holes, mut sheltered_eighths) = match *self {
                SpecialElements::Split { inversions, holes, sheltered_eighths } => {
                    (inversions, holes, sheltered_eighths)
                }
                SpecialElements::Packed(_) if !s.is_reading() => {
                    return Err(Error::UnmigratedState("packed ride statistics".into()));
                }
                SpecialElements::Packed(_) => (0, 0, 0),
            };
            s.rw_u8(&mut inversions)?;
            s.rw_u8(&mut holes)?;
            s.rw_u8(&mut sheltered_eighths)?;
            *self = SpecialElements::Split { inversions, holes, sheltered_eighths };
        } else {
            let mut packed = match *self {
                SpecialElements::Packed(b) => b,
                SpecialElements::Split { .. } if !s.is_reading() => {
                    return Err(Error::InvalidData("split ride statistics in a packed-stats file".into()));
                }
                SpecialElements::Split { .. } => 0,
            };
            s.rw_u8(&mut packed)?;
            *self = SpecialElements::Packed(packed);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideStats {
    pub excitement: i16,
    pub intensity: i16,
    pub nausea: i16,
    pub max_speed: i32,
    pub special: SpecialElements,
}

impl Persist for RideStats {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        s.rw_i16(&mut self.excitement)?;
        s.rw_i16(&mut self.intensity)?;
        s.rw_i16(&mut self.nausea)?;
        s.rw_i32(&mut self.max_speed)?;
        self.special.persist(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ride {
    pub id: RideId,
    pub ride_type: RideType,
    pub object: ObjectIndex,
    pub name: String,
    pub status: RideStatus,
    pub price: u16,
    pub stats: RideStats,
}

impl Persist for Ride {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        self.id.persist(s)?;

        let mut ride_type = self.ride_type as u8;
        s.rw_u8(&mut ride_type)?;
        self.ride_type = RideType::from_u8(ride_type)
            .ok_or_else(|| Error::InvalidData(format!("unknown ride type {ride_type}")))?;

        self.object.persist(s)?;
        s.rw_string(&mut self.name)?;

        let mut status = self.status as u8;
        s.rw_u8(&mut status)?;
        self.status = RideStatus::from_u8(status)
            .ok_or_else(|| Error::InvalidData(format!("unknown ride status {status}")))?;

        s.rw_u16(&mut self.price)?;
        self.stats.persist(s)
    }
}

/// Rides keyed by id, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideTable {
    rides: IndexMap<RideId, Ride>,
}

impl RideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ride, replacing any ride with the same id.
    pub fn insert(&mut self, ride: Ride) -> Option<Ride> {
        self.rides.insert(ride.id, ride)
    }

    pub fn get(&self, id: RideId) -> Option<&Ride> {
        self.rides.get(&id)
    }

    pub fn get_mut(&mut self, id: RideId) -> Option<&mut Ride> {
        self.rides.get_mut(&id)
    }

    pub fn contains(&self, id: RideId) -> bool {
        self.rides.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ride> {
        self.rides.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ride> {
        self.rides.values_mut()
    }
}

impl Persist for RideTable {
    fn persist<S: Stream>(&mut self, s: &mut S) -> Result<()> {
        let mut count: u32 = if s.is_reading() { 0 } else { checked_len(self.rides.len(), "ride table")? };
        s.rw_u32(&mut count)?;
        if s.is_reading() {
            self.rides.clear();
            for _ in 0..count {
                let mut ride = Ride::default();
                ride.persist(s)?;
                let id = ride.id;
                if self.rides.insert(id, ride).is_some() {
                    return Err(Error::InvalidData(format!("ride {} stored twice", id.0)));
                }
            }
        } else {
            for ride in self.rides.values_mut() {
                ride.persist(s)?;
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

    fn flume() -> Ride {
        Ride {
            id: RideId(4),
            ride_type: RideType::LogFlume,
            object: ObjectIndex(2),
            name: "Log Flume 1".into(),
            status: RideStatus::Open,
            price: 30,
            stats: RideStats {
                excitement: 512,
                intensity: 340,
                nausea: 120,
                max_speed: 0x000C_0000,
                special: SpecialElements::Split { inversions: 0, holes: 0, sheltered_eighths: 3 },
            },
        }
    }

    #[test]
    fn test_ride_table_roundtrip_keeps_order() {
        let mut table = RideTable::new();
        table.insert(Ride { id: RideId(9), name: "Merry-Go-Round 1".into(), ..Default::default() });
        table.insert(flume());

        let mut writer = ChunkWriter::new();
        table.clone().persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut decoded = RideTable::new();
        decoded.persist(&mut ChunkReader::new(&bytes, CURRENT_VERSION)).unwrap();
        assert_eq!(decoded, table);
        let ids: Vec<_> = decoded.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RideId(9), RideId(4)]);
    }

    #[test]
    fn test_duplicate_ride_id_rejected() {
        let mut writer = ChunkWriter::new();
        let mut count = 2u32;
        writer.rw_u32(&mut count).unwrap();
        flume().persist(&mut writer).unwrap();
        flume().persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut table = RideTable::new();
        assert!(table.persist(&mut ChunkReader::new(&bytes, CURRENT_VERSION)).is_err());
    }

    #[test]
    fn test_packed_stats_before_split() {
        let version = RIDE_STATS_SPLIT - 1;
        let mut ride = flume();
        ride.stats.special = SpecialElements::Packed(0b011_00010);

        let mut writer = ChunkWriter::at_version(version);
        ride.clone().persist(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut decoded = Ride::default();
        let mut reader = ChunkReader::new(&bytes, version);
        decoded.persist(&mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded.stats.special, SpecialElements::Packed(0b011_00010));
    }

    #[test]
    fn test_current_writer_refuses_packed_stats() {
        let mut ride = flume();
        ride.stats.special = SpecialElements::Packed(1);
        let err = ride.persist(&mut ChunkWriter::new()).unwrap_err();
        assert!(matches!(err, Error::UnmigratedState(_)));
    }

    #[test]
    fn test_unknown_ride_type_rejected() {
        let mut writer = ChunkWriter::new();
        flume().persist(&mut writer).unwrap();
        let mut bytes = writer.into_bytes();
        bytes[2] = 0xEE;
        let mut ride = Ride::default();
        assert!(ride.persist(&mut ChunkReader::new(&bytes, CURRENT_VERSION)).is_err());
    }
}
