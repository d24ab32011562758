//! Mapping a changed file to the build unit that owns it.
//!
//! A unit owns every file below the directory holding its marker, except files
//! that sit below a deeper marker. Both strategies implement that rule: the
//! nearest enclosing marker wins.

use std::path::{Path, PathBuf};

use glob::Pattern;

use multibuild_config::{BuildConfig, OwnershipStrategy};
use multibuild_unit::BuildUnitId;
use multibuild_util::fs::{collect_markers, lexical_normalize, marker_pattern, markers_in_dir};

use crate::error::EngineError;

#[derive(Debug, Clone)]
enum Strategy {
    /// Walk up from the changed file, listing each directory.
    Ascent,
    /// Markers under the root, enumerated once and sorted.
    PrefixScan { markers: Vec<PathBuf> },
}

/// Resolves changed paths to their owning build unit.
#[derive(Debug, Clone)]
pub struct PathOwnershipResolver {
    root: PathBuf,
    pattern: Pattern,
    strategy: Strategy,
}

impl PathOwnershipResolver {
    /// A resolver that ascends from each changed file toward the filesystem root.
    ///
    /// Sees markers above `root` too, and pays one directory listing per level.
    pub fn ascent(root: &Path, pattern: Pattern) -> Self {
        Self {
            root: lexical_normalize(root),
            pattern,
            strategy: Strategy::Ascent,
        }
    }

    /// A resolver that enumerates every marker under `root` up front.
    ///
    /// Only markers under `root` can own a path.
    ///
    /// # Errors
    /// Returns an error if any directory under `root` cannot be read.
    pub fn prefix_scan(root: &Path, pattern: Pattern) -> Result<Self, EngineError> {
        let root = lexical_normalize(root);
        let markers = collect_markers(&root, &pattern)?;
        tracing::debug!(count = markers.len(), root = %root.display(), "enumerated markers");
        Ok(Self {
            root,
            pattern,
            strategy: Strategy::PrefixScan { markers },
        })
    }

    /// Build the resolver described by `config`.
    ///
    /// # Errors
    /// Returns an error if the marker pattern is invalid or, for the prefix-scan
    /// strategy, the working directory cannot be enumerated.
    pub fn from_config(config: &BuildConfig) -> Result<Self, EngineError> {
        let pattern = marker_pattern(&config.marker)?;
        match config.strategy {
            OwnershipStrategy::Ascent => Ok(Self::ascent(&config.working_directory, pattern)),
            OwnershipStrategy::PrefixScan => Self::prefix_scan(&config.working_directory, pattern),
        }
    }

    /// The directory changed paths are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The unit owning `changed_path`, or `None` if no marker encloses it.
    ///
    /// Blank paths resolve to `None`.
    pub fn resolve(&self, changed_path: &str) -> Option<BuildUnitId> {
        if changed_path.trim().is_empty() {
            return None;
        }
        let normalized = changed_path.replace('\\', "/");
        let full = lexical_normalize(&self.root.join(normalized));
        let start = full.parent()?;

        let marker = match &self.strategy {
            Strategy::Ascent => self.ascend(start),
            Strategy::PrefixScan { markers } => deepest_marker(markers, start).cloned(),
        };

        match marker {
            Some(marker) => {
                let unit = BuildUnitId::from_path(&marker);
                tracing::debug!(path = changed_path, %unit, "resolved owner");
                Some(unit)
            }
            None => {
                tracing::debug!(path = changed_path, "no enclosing unit");
                None
            }
        }
    }

    fn ascend(&self, start: &Path) -> Option<PathBuf> {
        let mut current = Some(start);
        while let Some(dir) = current {
            // Deleted files can leave no directory behind at the newer revision.
            if dir.is_dir() {
                match markers_in_dir(dir, &self.pattern) {
                    Ok(markers) => {
                        if let Some(first) = markers.into_iter().next() {
                            return Some(first);
                        }
                    }
                    Err(e) => tracing::warn!("skipping unreadable directory: {e}"),
                }
            }
            current = dir.parent();
        }
        None
    }
}

/// The marker whose directory is the longest prefix of `dir`.
///
/// `markers` must be sorted so that, within one directory, the first name wins.
fn deepest_marker<'a>(markers: &'a [PathBuf], dir: &Path) -> Option<&'a PathBuf> {
    let mut best: Option<(&PathBuf, usize)> = None;
    for marker in markers {
        let Some(marker_dir) = marker.parent() else {
            continue;
        };
        if !dir.starts_with(marker_dir) {
            continue;
        }
        let depth = marker_dir.components().count();
        if best.map_or(true, |(_, best_depth)| depth > best_depth) {
            best = Some((marker, depth));
        }
    }
    best.map(|(marker, _)| marker)
}
