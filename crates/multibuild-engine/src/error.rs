//! Error types for multibuild-engine.

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] multibuild_util::error::UtilError),

    /// Configuration was missing or invalid.
    #[error("{0}")]
    Config(#[from] multibuild_config::ConfigError),

    /// The revision range could not be diffed.
    #[error("{0}")]
    Diff(#[from] multibuild_git::GitError),

    /// The executor was handed an empty sequence.
    #[error("no build units to run: nothing changed under a unit and always_build is empty")]
    NothingToBuild,

    /// A configuration file already exists at the target path.
    #[error("{path} already exists, refusing to overwrite it")]
    ConfigExists { path: String },
}
