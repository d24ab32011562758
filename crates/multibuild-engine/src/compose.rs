//! Merging changed units with the always-build list.

use serde::Serialize;

use multibuild_unit::{BuildUnitId, BuildUnitSet};

/// The units to build, and which of them were added only because they are
/// configured to always build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposedSet {
    /// Impacted units followed by `forced`.
    pub working: BuildUnitSet,
    /// Always-build units that were not impacted, in configured order.
    pub forced: Vec<BuildUnitId>,
}

/// Append every always-build unit not already impacted.
pub fn compose(impacted: &BuildUnitSet, always_build: &[BuildUnitId]) -> ComposedSet {
    let mut working = impacted.clone();
    let mut forced = Vec::new();
    for unit in always_build {
        if working.insert(unit.clone()) {
            forced.push(unit.clone());
        }
    }
    ComposedSet { working, forced }
}
