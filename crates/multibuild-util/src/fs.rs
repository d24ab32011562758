//! Filesystem utilities for multibuild.

use std::path::{Component, Path, PathBuf};

use glob::Pattern;

use crate::error::UtilError;

/// Compile a marker file-name pattern such as `*.sln`.
///
/// The pattern is matched against bare file names, so it may not be empty or
/// contain a path separator.
///
/// # Errors
/// Returns an error if the pattern is empty, contains a separator, or is not a valid glob.
pub fn marker_pattern(pattern: &str) -> Result<Pattern, UtilError> {
    if pattern.trim().is_empty() {
        return Err(UtilError::GlobPattern {
            pattern: pattern.to_owned(),
            message: "pattern is empty".to_owned(),
        });
    }
    if pattern.contains('/') || pattern.contains('\\') {
        return Err(UtilError::GlobPattern {
            pattern: pattern.to_owned(),
            message: "pattern must match a file name, not a path".to_owned(),
        });
    }
    Pattern::new(pattern).map_err(|e| UtilError::GlobPattern {
        pattern: pattern.to_owned(),
        message: e.msg.to_owned(),
    })
}

/// List the marker files directly inside `dir` (not recursive), sorted by path.
///
/// # Errors
/// Returns an error if `dir` cannot be read.
pub fn markers_in_dir(dir: &Path, pattern: &Pattern) -> Result<Vec<PathBuf>, UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| UtilError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut markers = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && matches_marker(&path, pattern) {
            markers.push(path);
        }
    }
    markers.sort();
    Ok(markers)
}

/// Collect every marker file under `root`, recursively, sorted by path.
///
/// `.git` directories and symlinked directories are not descended into.
/// Subdirectories that cannot be read are skipped with a warning.
///
/// # Errors
/// Returns an error if `root` itself cannot be read.
pub fn collect_markers(root: &Path, pattern: &Pattern) -> Result<Vec<PathBuf>, UtilError> {
    let mut markers = Vec::new();
    collect_markers_recursive(root, pattern, &mut markers)?;
    markers.sort();
    Ok(markers)
}

fn collect_markers_recursive(
    dir: &Path,
    pattern: &Pattern,
    out: &mut Vec<PathBuf>,
) -> Result<(), UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| UtilError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| UtilError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if file_type.is_dir() {
            if path.file_name().is_some_and(|n| n == ".git") {
                continue;
            }
            if let Err(e) = collect_markers_recursive(&path, pattern, out) {
                tracing::warn!("skipping unreadable directory: {e}");
            }
        } else if path.is_file() && matches_marker(&path, pattern) {
            out.push(path);
        }
    }

    Ok(())
}

fn matches_marker(path: &Path, pattern: &Pattern) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| pattern.matches(n))
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root; leading `..` on a relative path is kept.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make `path` absolute against the current directory, then normalize it lexically.
///
/// # Errors
/// Returns an error if `path` is relative and the current directory cannot be read.
pub fn absolutize(path: &Path) -> Result<PathBuf, UtilError> {
    if path.is_absolute() {
        return Ok(lexical_normalize(path));
    }
    let cwd = std::env::current_dir().map_err(|source| UtilError::Io {
        path: ".".to_owned(),
        source,
    })?;
    Ok(lexical_normalize(&cwd.join(path)))
}
