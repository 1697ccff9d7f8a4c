//! Park state model walked by the persistence layer.

pub mod entity;
pub mod names;
pub mod object;
pub mod park;
pub mod research;
pub mod ride;
pub mod tile;

pub use entity::{
    Balloon, Coords, Duck, Entity, EntityId, EntityKind, EntityTable, Guest, GuestFlags, GuestName,
    Litter, PatrolArea, PatrolCell, Staff, StaffType, Vehicle,
};
pub use names::{NameId, PeepNameTable};
pub use object::{ObjectId, ObjectIndex, ObjectKind, ObjectList, ObjectRef};
pub use park::{Authoring, Dangling, General, LegacyData, Objective, ParkFlags, ParkInfo, ParkState, Scenario};
pub use research::{ResearchItem, ResearchKind, ResearchState};
pub use ride::{Ride, RideId, RideStats, RideStatus, RideTable, RideType, SpecialElements};
pub use tile::{
    track_type, PathElement, SceneryElement, SurfaceElement, TerrainRef, TileElement, TileMap,
    TrackElement, DEFAULT_BLOCK_BRAKE_SPEED,
};
