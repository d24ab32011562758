//! Error types for multibuild-config.

/// Errors produced while locating, reading, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no multibuild.toml found (looked in {searched}); run `multibuild init` to create one")]
    NotFound { searched: String },

    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("cannot serialize configuration: {source}")]
    Serialize { source: toml::ser::Error },

    #[error("command template `{template}` must contain `{{unit}}` exactly once, found {count}")]
    InvalidTemplate { template: String, count: usize },

    #[error("invalid marker: {source}")]
    Marker {
        source: multibuild_util::error::UtilError,
    },

    #[error("{0}")]
    Util(#[from] multibuild_util::error::UtilError),

    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,
}
