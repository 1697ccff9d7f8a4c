//! Picks the object definitions a save must carry.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::repository::{ObjectDefinition, ObjectRepository};
use crate::state::{ObjectId, ObjectKind, ObjectRef, ParkState, TerrainRef, TileElement};

/// Definitions to embed in the packed objects chunk, ordered by identifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportList {
    pub objects: Vec<ObjectDefinition>,
    /// In use but unknown to the repository
    pub unresolved: Vec<ObjectId>,
}

impl ExportList {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn refs_in_use(park: &ParkState) -> BTreeSet<ObjectRef> {
    let mut refs = BTreeSet::new();

    for element in park.map.elements() {
        match element {
            TileElement::Surface(surface) => {
                if let TerrainRef::Object(index) = surface.terrain {
                    refs.insert(ObjectRef::new(ObjectKind::TerrainSurface, index));
                }
                if let TerrainRef::Object(index) = surface.edge {
                    refs.insert(ObjectRef::new(ObjectKind::TerrainEdge, index));
                }
            }
            TileElement::Path(path) => {
                refs.insert(ObjectRef::new(ObjectKind::Footpath, path.surface));
            }
            TileElement::Scenery(scenery) => {
                refs.insert(ObjectRef::new(ObjectKind::SmallScenery, scenery.object));
            }
            TileElement::Track(_) => {}
        }
    }

    refs.extend(park.rides.iter().map(|r| ObjectRef::new(ObjectKind::Ride, r.object)));
    refs.extend(park.research.items().map(|item| item.object_ref()));

    // Only meaningful once the park has loaded an entrance or water style
    for r in [
        ObjectRef::new(ObjectKind::ParkEntrance, park.park.entrance),
        ObjectRef::new(ObjectKind::Water, park.park.water),
    ] {
        if !park.objects.table(r.kind).is_empty() {
            refs.insert(r);
        }
    }
    refs
}

/// Collect every custom object the park uses.
///
/// The same park always yields the same list.
pub fn select(park: &ParkState, repository: &dyn ObjectRepository) -> ExportList {
    let mut ids = BTreeSet::new();
    for r in refs_in_use(park) {
        match park.objects.get(r) {
            Some(id) => {
                ids.insert(id.clone());
            }
            None => warn!(kind = ?r.kind, index = r.index.0, "reference outside the object list"),
        }
    }

    let mut list = ExportList::default();
    for id in ids {
        match repository.find(&id) {
            Some(def) if def.is_builtin() => {}
            Some(def) => list.objects.push(def.clone()),
            None => {
                warn!(object = %id, "object in use but not in the repository");
                list.unresolved.push(id);
            }
        }
    }
    debug!(packed = list.objects.len(), unresolved = list.unresolved.len(), "selected objects");
    list
}
