//! Parse and validate `multibuild.toml` and `build-order.toml`.

pub mod config;
pub mod error;
pub mod order;
pub mod store;

pub use config::{BuildConfig, CommandTemplate, ConfigFile, OwnershipStrategy};
pub use error::ConfigError;
pub use store::{ConfigStore, FileConfigStore};
