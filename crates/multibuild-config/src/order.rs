use serde::{Deserialize, Serialize};
use std::path::Path;

use multibuild_unit::{BuildUnitId, PreferredOrder};

use crate::error::ConfigError;

/// The `build-order.toml` file: units to build first, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildOrderFile {
    #[serde(default)]
    pub units: Vec<String>,
}

impl BuildOrderFile {
    /// Read and parse a `build-order.toml` from the given path.
    /// Returns an empty order if the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Resolve every entry against `working_directory`.
    pub fn resolve(&self, working_directory: &Path) -> PreferredOrder {
        self.units
            .iter()
            .map(|raw| BuildUnitId::resolve(raw, working_directory))
            .collect()
    }
}
