//! Semantic transforms run when a file crosses a gate.
//!
//! Each transform owns the fields its gate changed and leaves already
//! current data untouched, so running one twice changes nothing.

use std::collections::BTreeSet;

use crate::migrate::MigrationContext;
use crate::repository::{LEGACY_TERRAIN_EDGES, LEGACY_TERRAIN_SURFACES};
use crate::state::tile::{track_type, DEFAULT_BLOCK_BRAKE_SPEED};
use crate::state::{
    Entity, GuestName, ObjectId, ObjectKind, ObjectList, ParkState, RideType, SpecialElements, TerrainRef,
};

type TransformResult = std::result::Result<(), String>;

fn terrain_object(
    objects: &mut ObjectList,
    ctx: &MigrationContext<'_>,
    kind: ObjectKind,
    table: &[&str],
    style: u8,
) -> std::result::Result<TerrainRef, String> {
    let id = table
        .get(style as usize)
        .map(|id| ObjectId::new(*id))
        .ok_or_else(|| format!("terrain style {style} has no {kind:?} object"))?;
    if !ctx.resolves(&id) {
        return Err(format!("object {id} is not available"));
    }
    let index = objects.add(kind, id).map_err(|e| e.to_string())?;
    Ok(TerrainRef::Object(index))
}

pub fn terrain_styles_as_objects(park: &mut ParkState, ctx: &MigrationContext<'_>) -> TransformResult {
    let objects = &mut park.objects;
    for surface in park.map.surfaces_mut() {
        if let TerrainRef::Legacy(style) = surface.terrain {
            surface.terrain =
                terrain_object(objects, ctx, ObjectKind::TerrainSurface, LEGACY_TERRAIN_SURFACES, style)?;
        }
        if let TerrainRef::Legacy(style) = surface.edge {
            surface.edge = terrain_object(objects, ctx, ObjectKind::TerrainEdge, LEGACY_TERRAIN_EDGES, style)?;
        }
    }
    Ok(())
}

pub fn block_brake_speed(park: &mut ParkState, _ctx: &MigrationContext<'_>) -> TransformResult {
    for track in park.map.track_elements_mut() {
        if track.track_type == track_type::BLOCK_BRAKES && track.brake_speed.is_none() {
            track.brake_speed = Some(DEFAULT_BLOCK_BRAKE_SPEED);
        }
    }
    Ok(())
}

pub fn ride_stats_split(park: &mut ParkState, _ctx: &MigrationContext<'_>) -> TransformResult {
    for ride in park.rides.iter_mut() {
        if let SpecialElements::Packed(b) = ride.stats.special {
            let low = b & 0x1F;
            let (inversions, holes) = if ride.ride_type == RideType::MiniGolf { (0, low) } else { (low, 0) };
            ride.stats.special = SpecialElements::Split { inversions, holes, sheltered_eighths: b >> 5 };
        }
    }
    Ok(())
}

pub fn log_flume_steep_slopes(park: &mut ParkState, _ctx: &MigrationContext<'_>) -> TransformResult {
    let flumes: BTreeSet<_> = park
        .rides
        .iter()
        .filter(|r| r.ride_type == RideType::LogFlume)
        .map(|r| r.id)
        .collect();
    for track in park.map.track_elements_mut() {
        // Pieces of rides that no longer exist are left alone
        if flumes.contains(&track.ride) && track.track_type == track_type::DOWN_25_TO_DOWN_60 {
            track.track_type = track_type::LOG_FLUME_REVERSER;
        }
    }
    Ok(())
}

pub fn peep_names_as_objects(park: &mut ParkState, _ctx: &MigrationContext<'_>) -> TransformResult {
    let names = &mut park.peep_names;
    for guest in park.entities.guests_mut() {
        if let GuestName::Baked(name) = &guest.name {
            let id = names.intern(name);
            guest.name = GuestName::Object(id);
        }
    }
    Ok(())
}

pub fn staff_patrol_per_entity(park: &mut ParkState, _ctx: &MigrationContext<'_>) -> TransformResult {
    for (id, area) in std::mem::take(&mut park.legacy.patrol_areas) {
        match park.entities.get_mut(id) {
            Some(Entity::Staff(staff)) => staff.patrol_area = area,
            Some(other) => {
                return Err(format!("patrol area owner {} is a {:?}, not staff", id.0, other.kind()))
            }
            None => return Err(format!("patrol area owner {} does not exist", id.0)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryRepository, ObjectDefinition};
    use crate::state::tile::{SurfaceElement, TileElement, TrackElement};
    use crate::state::{EntityId, Guest, NameId, PatrolArea, PatrolCell, Ride, RideId, Staff, TileMap};

    fn with_ctx<R>(f: impl FnOnce(&MigrationContext<'_>) -> R) -> R {
        let repo = InMemoryRepository::with_builtins();
        f(&MigrationContext::new(&repo, &[]))
    }

    fn run(t: crate::migrate::gates::Transform, park: &mut ParkState) -> TransformResult {
        with_ctx(|ctx| t(park, ctx))
    }

    fn one_tile(elements: Vec<TileElement>) -> TileMap {
        let mut map = TileMap::new(1, 1);
        *map.tile_mut(0, 0).unwrap() = elements;
        map
    }

    #[test]
    fn test_terrain_styles_become_objects() {
        let mut old = ParkState::default();
        old.map = one_tile(vec![TileElement::Surface(SurfaceElement {
            base_height: 4,
            terrain: TerrainRef::Legacy(2),
            edge: TerrainRef::Legacy(1),
            water_height: 0,
        })]);
        run(terrain_styles_as_objects, &mut old).unwrap();

        let mut expected = ParkState::default();
        let dirt = expected.objects.add(ObjectKind::TerrainSurface, ObjectId::new("rct2.terrain_surface.dirt")).unwrap();
        let wood = expected.objects.add(ObjectKind::TerrainEdge, ObjectId::new("rct2.terrain_edge.wood_red")).unwrap();
        expected.map = one_tile(vec![TileElement::Surface(SurfaceElement {
            base_height: 4,
            terrain: TerrainRef::Object(dirt),
            edge: TerrainRef::Object(wood),
            water_height: 0,
        })]);
        assert_eq!(old, expected);

        // Second run is a no-op
        run(terrain_styles_as_objects, &mut old).unwrap();
        assert_eq!(old, expected);
    }

    #[test]
    fn test_terrain_style_out_of_range_fails() {
        let mut park = ParkState::default();
        park.map = one_tile(vec![TileElement::Surface(SurfaceElement {
            terrain: TerrainRef::Legacy(200),
            edge: TerrainRef::Legacy(0),
            ..Default::default()
        })]);
        assert!(run(terrain_styles_as_objects, &mut park).is_err());
    }

    #[test]
    fn test_terrain_objects_must_resolve() {
        let empty = InMemoryRepository::new();
        let mut park = ParkState::default();
        park.map = one_tile(vec![TileElement::Surface(SurfaceElement {
            terrain: TerrainRef::Legacy(0),
            edge: TerrainRef::Legacy(0),
            ..Default::default()
        })]);
        let err = terrain_styles_as_objects(&mut park.clone(), &MigrationContext::new(&empty, &[])).unwrap_err();
        assert!(err.contains("rct2.terrain_surface.grass"));

        // Packed definitions in the file satisfy the lookup
        let packed = vec![
            ObjectDefinition::builtin(ObjectKind::TerrainSurface, "rct2.terrain_surface.grass"),
            ObjectDefinition::builtin(ObjectKind::TerrainEdge, "rct2.terrain_edge.rock"),
        ];
        terrain_styles_as_objects(&mut park, &MigrationContext::new(&empty, &packed)).unwrap();
    }

    #[test]
    fn test_block_brakes_get_default_speed() {
        let track = |track_type, brake_speed| {
            TileElement::Track(TrackElement { ride: RideId(0), track_type, brake_speed, ..Default::default() })
        };
        let mut old = ParkState::default();
        old.map = one_tile(vec![
            track(track_type::BLOCK_BRAKES, None),
            track(track_type::BRAKES, Some(5)),
            track(track_type::FLAT, None),
        ]);
        run(block_brake_speed, &mut old).unwrap();

        let mut expected = ParkState::default();
        expected.map = one_tile(vec![
            track(track_type::BLOCK_BRAKES, Some(DEFAULT_BLOCK_BRAKE_SPEED)),
            track(track_type::BRAKES, Some(5)),
            track(track_type::FLAT, None),
        ]);
        assert_eq!(old, expected);
    }

    #[test]
    fn test_ride_stats_split_by_ride_type() {
        let ride = |id, ride_type, special| {
            let mut r = Ride { id: RideId(id), ride_type, ..Default::default() };
            r.stats.special = special;
            r
        };
        let mut old = ParkState::default();
        old.rides.insert(ride(0, RideType::SpiralRollerCoaster, SpecialElements::Packed(0b010_00011)));
        old.rides.insert(ride(1, RideType::MiniGolf, SpecialElements::Packed(0b001_10010)));
        run(ride_stats_split, &mut old).unwrap();

        let mut expected = ParkState::default();
        expected.rides.insert(ride(
            0,
            RideType::SpiralRollerCoaster,
            SpecialElements::Split { inversions: 3, holes: 0, sheltered_eighths: 2 },
        ));
        expected.rides.insert(ride(
            1,
            RideType::MiniGolf,
            SpecialElements::Split { inversions: 0, holes: 18, sheltered_eighths: 1 },
        ));
        assert_eq!(old, expected);
    }

    #[test]
    fn test_log_flume_reverser_remapped() {
        let piece = |ride, track_type| {
            TileElement::Track(TrackElement { ride: RideId(ride), track_type, ..Default::default() })
        };
        let mut old = ParkState::default();
        old.rides.insert(Ride { id: RideId(0), ride_type: RideType::LogFlume, ..Default::default() });
        old.rides.insert(Ride { id: RideId(1), ride_type: RideType::WoodenRollerCoaster, ..Default::default() });
        old.map = one_tile(vec![
            piece(0, track_type::DOWN_25_TO_DOWN_60),
            piece(0, track_type::DOWN_25),
            piece(1, track_type::DOWN_25_TO_DOWN_60),
            piece(7, track_type::DOWN_25_TO_DOWN_60),
        ]);
        run(log_flume_steep_slopes, &mut old).unwrap();

        let mut expected = old.clone();
        expected.map = one_tile(vec![
            piece(0, track_type::LOG_FLUME_REVERSER),
            piece(0, track_type::DOWN_25),
            piece(1, track_type::DOWN_25_TO_DOWN_60),
            piece(7, track_type::DOWN_25_TO_DOWN_60),
        ]);
        assert_eq!(old, expected);
    }

    #[test]
    fn test_baked_names_interned() {
        let guest = |id, name| Guest { id: EntityId(id), name, ..Default::default() };
        let mut old = ParkState::default();
        old.entities.insert(guest(1, GuestName::Baked("Ann T.".into()))).unwrap();
        old.entities.insert(guest(2, GuestName::Baked("Bo K.".into()))).unwrap();
        old.entities.insert(guest(3, GuestName::Baked("Ann T.".into()))).unwrap();
        run(peep_names_as_objects, &mut old).unwrap();

        let mut expected = ParkState::default();
        let ann = expected.peep_names.intern("Ann T.");
        let bo = expected.peep_names.intern("Bo K.");
        expected.entities.insert(guest(1, GuestName::Object(ann))).unwrap();
        expected.entities.insert(guest(2, GuestName::Object(bo))).unwrap();
        expected.entities.insert(guest(3, GuestName::Object(ann))).unwrap();
        assert_eq!(old, expected);
        assert_eq!(ann, NameId(0));
    }

    #[test]
    fn test_patrol_areas_move_to_staff() {
        let area = PatrolArea { cells: vec![PatrolCell { x: 2, y: 9 }] };
        let mut old = ParkState::default();
        old.entities.insert(Staff { id: EntityId(5), ..Default::default() }).unwrap();
        old.legacy.patrol_areas.push((EntityId(5), area.clone()));
        run(staff_patrol_per_entity, &mut old).unwrap();

        let mut expected = ParkState::default();
        expected
            .entities
            .insert(Staff { id: EntityId(5), patrol_area: area, ..Default::default() })
            .unwrap();
        assert_eq!(old, expected);
    }

    #[test]
    fn test_patrol_area_for_non_staff_fails() {
        let mut park = ParkState::default();
        park.entities.insert(Guest { id: EntityId(5), ..Default::default() }).unwrap();
        park.legacy.patrol_areas.push((EntityId(5), PatrolArea::default()));
        assert!(run(staff_patrol_per_entity, &mut park).unwrap_err().contains("not staff"));

        let mut park = ParkState::default();
        park.legacy.patrol_areas.push((EntityId(8), PatrolArea::default()));
        assert!(run(staff_patrol_per_entity, &mut park).is_err());
    }
}
