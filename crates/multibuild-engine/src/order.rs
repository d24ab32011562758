//! Imposing the preferred build order.

use std::collections::HashSet;

use multibuild_unit::{BuildUnitId, BuildUnitSet, PreferredOrder};

/// Order `working` so that units named in `preferred` come first, in
/// `preferred`'s order, followed by the rest in their original order.
///
/// The result is always a permutation of `working`. Preferred entries that are
/// not in `working` are ignored, as are repeats of an entry already placed.
pub fn order(working: &BuildUnitSet, preferred: &PreferredOrder) -> Vec<BuildUnitId> {
    if preferred.is_empty() {
        return working.as_slice().to_vec();
    }

    let mut placed: HashSet<&BuildUnitId> = HashSet::with_capacity(working.len());
    let mut sequence = Vec::with_capacity(working.len());

    for unit in preferred.iter() {
        if working.contains(unit) && placed.insert(unit) {
            sequence.push(unit.clone());
        }
    }
    for unit in working {
        if !placed.contains(unit) {
            sequence.push(unit.clone());
        }
    }

    tracing::debug!(
        preferred = placed.len(),
        total = sequence.len(),
        "applied preferred order"
    );
    sequence
}
