//! Which build units a revision range touches.

use multibuild_git::RevisionDiffProvider;
use multibuild_unit::BuildUnitSet;

use crate::error::EngineError;
use crate::ownership::PathOwnershipResolver;

/// Resolves a revision range to the set of units whose files changed.
pub struct ChangeImpactResolver<'a, D: RevisionDiffProvider + ?Sized> {
    diff: &'a D,
    ownership: &'a PathOwnershipResolver,
}

impl<'a, D: RevisionDiffProvider + ?Sized> ChangeImpactResolver<'a, D> {
    pub fn new(diff: &'a D, ownership: &'a PathOwnershipResolver) -> Self {
        Self { diff, ownership }
    }

    /// Units owning at least one path changed between `from` and `to`, in
    /// discovery order. No changes, or no owned changes, is an empty set.
    ///
    /// # Errors
    /// Returns an error if the diff provider cannot resolve the range.
    pub fn resolve(&self, from: &str, to: &str) -> Result<BuildUnitSet, EngineError> {
        let paths = self.diff.changed_paths(from, to, self.ownership.root())?;
        let units = impacted_units(&paths, self.ownership);
        tracing::info!(
            changed = paths.len(),
            units = units.len(),
            "resolved impacted units for {from}..{to}"
        );
        Ok(units)
    }
}

/// Map each changed path to its owner, dropping unowned paths and duplicates.
pub fn impacted_units(paths: &[String], ownership: &PathOwnershipResolver) -> BuildUnitSet {
    paths
        .iter()
        .filter_map(|path| ownership.resolve(path))
        .collect()
}
