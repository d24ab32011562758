//! Scaffolding for `multibuild init`.

use std::path::{Path, PathBuf};

use multibuild_config::store::CONFIG_FILE_NAME;
use multibuild_config::ConfigFile;

use crate::error::EngineError;

const HEADER: &str = "\
# multibuild configuration.
# `{unit}` in the command is replaced with each unit's marker path.
# Relative paths are resolved against the directory holding this file.

";

/// Write a starter `multibuild.toml` into `dir`.
///
/// Returns the path of the written file.
///
/// # Errors
/// Returns an error if:
/// - A `multibuild.toml` already exists in `dir`
/// - The directory or file cannot be created
pub fn init_config(dir: &Path) -> Result<PathBuf, EngineError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Err(EngineError::ConfigExists {
            path: config_path.display().to_string(),
        });
    }

    std::fs::create_dir_all(dir).map_err(|source| EngineError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let content = format!("{HEADER}{}", ConfigFile::starter().to_toml()?);
    std::fs::write(&config_path, content).map_err(|source| EngineError::Io {
        path: config_path.display().to_string(),
        source,
    })?;

    tracing::info!(path = %config_path.display(), "wrote starter configuration");
    Ok(config_path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use multibuild_config::{BuildConfig, OwnershipStrategy};

    use super::*;

    #[test]
    fn writes_loadable_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = init_config(tmp.path()).unwrap();

        assert_eq!(path, tmp.path().join("multibuild.toml"));
        let config = BuildConfig::from_path(&path).unwrap();
        assert_eq!(config.marker, "*.sln");
        assert_eq!(config.strategy, OwnershipStrategy::Ascent);
        assert!(config.always_build.is_empty());
        assert!(config.command.as_str().contains("{unit}"));
    }

    #[test]
    fn starts_with_comment_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = init_config(tmp.path()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("# multibuild configuration."));
        assert!(content.contains("[build]"));
    }

    #[test]
    fn refuses_existing_config() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("multibuild.toml"), "keep me").unwrap();

        let err = init_config(tmp.path()).unwrap_err();
        assert!(matches!(err, EngineError::ConfigExists { .. }));
        assert!(err.to_string().contains("already exists"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("multibuild.toml")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("deep").join("nested");
        let path = init_config(&dir).unwrap();
        assert!(path.is_file());
    }
}
