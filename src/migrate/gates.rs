//! Format versions and the gates introduced at each of them.
//!
//! A gate ties a version number to a change in encoding or meaning. The
//! table only ever grows: gates are never removed or renumbered.

use crate::migrate::transforms;
use crate::migrate::MigrationContext;
use crate::state::ParkState;

/// Version written by this build
pub const CURRENT_VERSION: u32 = 46;

/// Oldest reader generation that understands files written by this build
pub const MIN_FORWARD_COMPATIBLE: u32 = 45;

/// Oldest version this build opens by default; `None` opens any version
pub const DEFAULT_MIN_BACKWARD_COMPATIBLE: Option<u32> = None;

pub const TERRAIN_STYLES_AS_OBJECTS: u32 = 12;
pub const PACKED_OBJECTS_CHUNK: u32 = 18;
pub const BLOCK_BRAKE_SPEED: u32 = 27;
pub const RIDE_STATS_SPLIT: u32 = 31;
pub const LOG_FLUME_STEEP_SLOPES: u32 = 34;
pub const PEEP_NAMES_AS_OBJECTS: u32 = 40;
pub const WIDE_GUEST_CASH: u32 = 42;
pub const STAFF_PATROL_PER_ENTITY: u32 = 45;
pub const PREVIEW_IMAGE_CHUNK: u32 = 46;

const _: () = {
    assert!(MIN_FORWARD_COMPATIBLE <= CURRENT_VERSION);
    if let Some(min) = DEFAULT_MIN_BACKWARD_COMPATIBLE {
        assert!(min <= CURRENT_VERSION);
    }
    assert!(table_is_ordered(GATES));
};

pub type Transform = fn(&mut ParkState, &MigrationContext<'_>) -> std::result::Result<(), String>;

pub struct Gate {
    pub version: u32,
    pub name: &'static str,
    pub description: &'static str,
    /// Encoding-only gates have nothing to reinterpret
    pub transform: Option<Transform>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("version", &self.version)
            .field("name", &self.name)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

pub const GATES: &[Gate] = &[
    Gate {
        version: TERRAIN_STYLES_AS_OBJECTS,
        name: "terrain_styles_as_objects",
        description: "terrain surface and edge styles became object references",
        transform: Some(transforms::terrain_styles_as_objects),
    },
    Gate {
        version: PACKED_OBJECTS_CHUNK,
        name: "packed_objects_chunk",
        description: "custom object definitions embedded in the file",
        transform: None,
    },
    Gate {
        version: BLOCK_BRAKE_SPEED,
        name: "block_brake_speed",
        description: "block brakes store their own speed",
        transform: Some(transforms::block_brake_speed),
    },
    Gate {
        version: RIDE_STATS_SPLIT,
        name: "ride_stats_split",
        description: "inversions, holes and sheltered eighths split into separate fields",
        transform: Some(transforms::ride_stats_split),
    },
    Gate {
        version: LOG_FLUME_STEEP_SLOPES,
        name: "log_flume_steep_slopes",
        description: "log flumes support steep slopes; the reverser got its own piece id",
        transform: Some(transforms::log_flume_steep_slopes),
    },
    Gate {
        version: PEEP_NAMES_AS_OBJECTS,
        name: "peep_names_as_objects",
        description: "guest names reference the name table instead of baked strings",
        transform: Some(transforms::peep_names_as_objects),
    },
    Gate {
        version: WIDE_GUEST_CASH,
        name: "wide_guest_cash",
        description: "guest cash widened to 32 bits",
        transform: None,
    },
    Gate {
        version: STAFF_PATROL_PER_ENTITY,
        name: "staff_patrol_per_entity",
        description: "patrol areas stored on each staff member",
        transform: Some(transforms::staff_patrol_per_entity),
    },
    Gate {
        version: PREVIEW_IMAGE_CHUNK,
        name: "preview_image_chunk",
        description: "park preview image embedded in the file",
        transform: None,
    },
];

/// True if versions strictly ascend and none exceeds [`CURRENT_VERSION`]
pub const fn table_is_ordered(table: &[Gate]) -> bool {
    let mut i = 0;
    while i < table.len() {
        if table[i].version > CURRENT_VERSION {
            return false;
        }
        if i > 0 && table[i - 1].version >= table[i].version {
            return false;
        }
        i += 1;
    }
    true
}

/// Gates a file written at `version` has not seen yet, oldest first
pub fn gates_after(version: u32) -> impl Iterator<Item = &'static Gate> {
    GATES
        .iter()
        .filter(move |g| g.version > version && g.version <= CURRENT_VERSION)
}

pub fn find(name: &str) -> Option<&'static Gate> {
    GATES.iter().find(|g| g.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_table_is_ordered() {
        assert!(table_is_ordered(GATES));
        assert_eq!(GATES.last().map(|g| g.version), Some(CURRENT_VERSION));
    }

    #[test]
    fn test_unordered_table_detected() {
        let table = [
            Gate { version: 5, name: "b", description: "", transform: None },
            Gate { version: 5, name: "a", description: "", transform: None },
        ];
        assert!(!table_is_ordered(&table));

        let future = [Gate { version: CURRENT_VERSION + 1, name: "x", description: "", transform: None }];
        assert!(!table_is_ordered(&future));
    }

    #[test]
    fn test_gate_names_unique() {
        let mut names: Vec<_> = GATES.iter().map(|g| g.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), GATES.len());
    }

    #[test]
    fn test_gates_after_selects_open_interval() {
        let versions: Vec<u32> = gates_after(RIDE_STATS_SPLIT).map(|g| g.version).collect();
        assert_eq!(
            versions,
            vec![LOG_FLUME_STEEP_SLOPES, PEEP_NAMES_AS_OBJECTS, WIDE_GUEST_CASH, STAFF_PATROL_PER_ENTITY, PREVIEW_IMAGE_CHUNK]
        );
        assert_eq!(gates_after(CURRENT_VERSION).count(), 0);
        assert_eq!(gates_after(0).count(), GATES.len());
    }

    #[test]
    fn test_find_by_name() {
        assert_eq!(find("wide_guest_cash").map(|g| g.version), Some(WIDE_GUEST_CASH));
        assert!(find("nonexistent").is_none());
    }
}
