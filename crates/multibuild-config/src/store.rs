//! Locating configuration on disk.

use std::path::{Path, PathBuf};

use multibuild_unit::PreferredOrder;

use crate::config::BuildConfig;
use crate::error::ConfigError;
use crate::order::BuildOrderFile;

/// Default name of the build configuration file.
pub const CONFIG_FILE_NAME: &str = "multibuild.toml";

/// Default name of the preferred-order file, looked up next to the config file.
pub const ORDER_FILE_NAME: &str = "build-order.toml";

/// Source of build configuration and the preferred build order.
pub trait ConfigStore {
    /// # Errors
    /// Returns an error if the configuration is absent or malformed.
    fn load_build_config(&self) -> Result<BuildConfig, ConfigError>;

    /// Load the preferred order, resolving relative entries against `working_directory`.
    /// An absent order file yields an empty order.
    ///
    /// # Errors
    /// Returns an error if the order file exists but is malformed.
    fn load_preferred_order(&self, working_directory: &Path)
        -> Result<PreferredOrder, ConfigError>;
}

/// Reads `multibuild.toml` and its sibling `build-order.toml`.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    config_path: PathBuf,
    order_path: PathBuf,
}

impl FileConfigStore {
    /// A store for the config file at `config_path`.
    pub fn new(config_path: &Path) -> Self {
        let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        Self {
            config_path: config_path.to_path_buf(),
            order_path: dir.join(ORDER_FILE_NAME),
        }
    }

    /// Find the config file.
    ///
    /// Uses `explicit` when given; otherwise looks for `multibuild.toml` in the
    /// current directory, then next to the running executable.
    ///
    /// # Errors
    /// Returns an error if no config file exists at any searched location.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => {
                let mut paths = Vec::new();
                if let Ok(cwd) = std::env::current_dir() {
                    paths.push(cwd.join(CONFIG_FILE_NAME));
                }
                if let Some(dir) = std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
                {
                    paths.push(dir.join(CONFIG_FILE_NAME));
                }
                paths
            }
        };

        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            tracing::debug!(path = %found.display(), "using configuration");
            return Ok(Self::new(found));
        }

        Err(ConfigError::NotFound {
            searched: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn order_path(&self) -> &Path {
        &self.order_path
    }
}

impl ConfigStore for FileConfigStore {
    fn load_build_config(&self) -> Result<BuildConfig, ConfigError> {
        BuildConfig::from_path(&self.config_path)
    }

    fn load_preferred_order(
        &self,
        working_directory: &Path,
    ) -> Result<PreferredOrder, ConfigError> {
        let file = BuildOrderFile::from_path(&self.order_path)?;
        Ok(file.resolve(working_directory))
    }
}
