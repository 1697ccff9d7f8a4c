//! Version gates and the pipeline that carries old files forward.

pub mod gates;
pub mod pipeline;
pub mod transforms;

use crate::repository::{ObjectDefinition, ObjectRepository, Overlay};
use crate::state::ObjectId;

pub use gates::{Gate, CURRENT_VERSION, DEFAULT_MIN_BACKWARD_COMPATIBLE, GATES, MIN_FORWARD_COMPATIBLE};
pub use pipeline::{migrate, MigrationReport};

/// Lookups available to transforms
pub struct MigrationContext<'a> {
    pub repository: &'a dyn ObjectRepository,
    /// Definitions embedded in the file being loaded
    pub packed: &'a [ObjectDefinition],
}

impl<'a> MigrationContext<'a> {
    pub fn new(repository: &'a dyn ObjectRepository, packed: &'a [ObjectDefinition]) -> Self {
        Self { repository, packed }
    }

    /// True if `id` is known to the installation or shipped in the file
    pub fn resolves(&self, id: &ObjectId) -> bool {
        Overlay::new(self.repository, self.packed).find(id).is_some()
    }
}
