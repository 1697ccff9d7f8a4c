use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result, VersionBound};
use crate::migrate::gates::{self, Gate, CURRENT_VERSION};
use crate::migrate::MigrationContext;
use crate::state::ParkState;

/// What the pipeline did to a loaded park
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub original_version: u32,
    pub final_version: u32,
    /// Every gate crossed, oldest first
    pub gates: Vec<&'static str>,
    /// Number of crossed gates that ran a transform
    pub transforms_applied: u32,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.gates.is_empty()
    }
}

/// Bring a park decoded from a `version` file up to [`CURRENT_VERSION`].
///
/// The park is consumed; on failure it is dropped, so no half-migrated
/// state ever reaches the caller.
pub fn migrate(park: ParkState, version: u32, ctx: &MigrationContext<'_>) -> Result<(ParkState, MigrationReport)> {
    run(park, version, gates::gates_after(version), ctx)
}

pub(crate) fn run<'g>(
    mut park: ParkState,
    version: u32,
    gates: impl IntoIterator<Item = &'g Gate>,
    ctx: &MigrationContext<'_>,
) -> Result<(ParkState, MigrationReport)> {
    if version > CURRENT_VERSION {
        return Err(Error::IncompatibleVersion {
            version,
            bound: VersionBound::TooNew { max: CURRENT_VERSION },
        });
    }

    let mut report = MigrationReport {
        original_version: version,
        final_version: version,
        gates: Vec::new(),
        transforms_applied: 0,
    };

    for gate in gates {
        if let Some(transform) = gate.transform {
            transform(&mut park, ctx).map_err(|reason| Error::MigrationFailed {
                version: gate.version,
                gate: gate.name,
                reason,
            })?;
            report.transforms_applied += 1;
        }
        debug!(gate = gate.name, version = gate.version, "crossed gate");
        report.gates.push(gate.name);
        report.final_version = gate.version;
    }
    report.final_version = CURRENT_VERSION;

    if let Some(leftover) = park.unmigrated() {
        return Err(Error::MigrationFailed {
            version: CURRENT_VERSION,
            gate: "final_check",
            reason: format!("{leftover} survived migration"),
        });
    }

    if !report.is_noop() {
        info!(
            from = report.original_version,
            to = report.final_version,
            gates = report.gates.len(),
            transforms = report.transforms_applied,
            "migrated park"
        );
    }
    Ok((park, report))
}
