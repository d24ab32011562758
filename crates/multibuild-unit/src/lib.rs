#![forbid(unsafe_code)]
//! Build-unit identity and the ordered collections built from it.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};

use multibuild_util::fs::lexical_normalize;

/// A build unit, identified by the path of its marker file.
///
/// The path is stored with `/` as its only separator. Case is preserved, so
/// `App.sln` and `app.sln` are different units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BuildUnitId(String);

impl BuildUnitId {
    /// Create an id from a raw path string, normalizing its separators.
    pub fn new(raw: &str) -> Self {
        Self(raw.replace('\\', "/"))
    }

    /// Create an id from a filesystem path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.to_string_lossy())
    }

    /// Create an id from a configured path, resolving it against `base` when relative.
    ///
    /// The result is lexically normalized so that configured ids compare equal to
    /// ids discovered on disk under `base`.
    pub fn resolve(raw: &str, base: &Path) -> Self {
        let normalized = raw.replace('\\', "/");
        let path = Path::new(&normalized);
        if path.is_absolute() {
            Self::from_path(&lexical_normalize(path))
        } else {
            Self::from_path(&lexical_normalize(&base.join(path)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The marker file name, e.g. `App.sln`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for BuildUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BuildUnitId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<BuildUnitId> for String {
    fn from(id: BuildUnitId) -> Self {
        id.0
    }
}

impl AsRef<str> for BuildUnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An insertion-ordered set of build units.
///
/// The first insertion of an id fixes its position; later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildUnitSet {
    units: Vec<BuildUnitId>,
    seen: HashSet<BuildUnitId>,
}

impl BuildUnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` at the end unless it is already present.
    ///
    /// Returns `true` if the id was added.
    pub fn insert(&mut self, id: BuildUnitId) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        self.seen.insert(id.clone());
        self.units.push(id);
        true
    }

    pub fn contains(&self, id: &BuildUnitId) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BuildUnitId> {
        self.units.iter()
    }

    pub fn as_slice(&self) -> &[BuildUnitId] {
        &self.units
    }
}

impl Extend<BuildUnitId> for BuildUnitSet {
    fn extend<I: IntoIterator<Item = BuildUnitId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl FromIterator<BuildUnitId> for BuildUnitSet {
    fn from_iter<I: IntoIterator<Item = BuildUnitId>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for BuildUnitSet {
    type Item = BuildUnitId;
    type IntoIter = std::vec::IntoIter<BuildUnitId>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}

impl<'a> IntoIterator for &'a BuildUnitSet {
    type Item = &'a BuildUnitId;
    type IntoIter = std::slice::Iter<'a, BuildUnitId>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

impl Serialize for BuildUnitSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.units)
    }
}

/// A human-curated priority list of build units.
///
/// Units listed here are built first, in this order. Duplicates are allowed;
/// only the first occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferredOrder {
    units: Vec<BuildUnitId>,
}

impl PreferredOrder {
    pub fn new(units: Vec<BuildUnitId>) -> Self {
        Self { units }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BuildUnitId> {
        self.units.iter()
    }
}

impl FromIterator<BuildUnitId> for PreferredOrder {
    fn from_iter<I: IntoIterator<Item = BuildUnitId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> BuildUnitId {
        BuildUnitId::new(s)
    }

    #[test]
    fn backslashes_become_slashes() {
        assert_eq!(id("C:\\repo\\App\\App.sln").as_str(), "C:/repo/App/App.sln");
        assert_eq!(id("repo\\App.sln"), id("repo/App.sln"));
    }

    #[test]
    fn case_is_preserved() {
        assert_ne!(id("/repo/App.sln"), id("/repo/app.sln"));
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(id("/repo/app/App.sln").file_name(), "App.sln");
        assert_eq!(id("App.sln").file_name(), "App.sln");
    }

    #[test]
    fn resolve_joins_relative_to_base() {
        let resolved = BuildUnitId::resolve("libs\\Shared/../Shared/Shared.sln", Path::new("/repo"));
        assert_eq!(resolved, id("/repo/libs/Shared/Shared.sln"));
    }

    #[test]
    fn resolve_keeps_absolute() {
        let resolved = BuildUnitId::resolve("/other/./X.sln", Path::new("/repo"));
        assert_eq!(resolved, id("/other/X.sln"));
    }

    #[test]
    fn set_drops_later_duplicates() {
        let mut set = BuildUnitSet::new();
        assert!(set.insert(id("b")));
        assert!(set.insert(id("a")));
        assert!(!set.insert(id("b")));
        assert!(!set.insert(id("a")));
        assert_eq!(set.as_slice(), &[id("b"), id("a")]);
    }

    #[test]
    fn set_dedups_across_separator_styles() {
        let set: BuildUnitSet = [id("x\\y.sln"), id("x/y.sln")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn preferred_order_from_iter() {
        let order: PreferredOrder = [id("a"), id("a"), id("b")].into_iter().collect();
        assert_eq!(order.len(), 3);
        assert!(!order.is_empty());
    }

    proptest! {
        #[test]
        fn set_holds_first_occurrences_in_order(
            raw in proptest::collection::vec("[abc]{1,2}", 0..24),
        ) {
            let set: BuildUnitSet = raw.iter().map(|s| id(s)).collect();

            let mut expected: Vec<BuildUnitId> = Vec::new();
            for s in &raw {
                let candidate = id(s);
                if !expected.contains(&candidate) {
                    expected.push(candidate);
                }
            }
            prop_assert_eq!(set.as_slice(), expected.as_slice());

            let unique: HashSet<_> = set.iter().collect();
            prop_assert_eq!(unique.len(), set.len());
        }
    }
}
