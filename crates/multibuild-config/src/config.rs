use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use multibuild_unit::BuildUnitId;
use multibuild_util::fs::{absolutize, lexical_normalize, marker_pattern};

use crate::error::ConfigError;

/// The placeholder substituted with each unit's id in the build command.
pub const UNIT_PLACEHOLDER: &str = "{unit}";

/// The `multibuild.toml` file as written on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub build: BuildSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Shell command run once per unit, with `{unit}` replaced by the unit id.
    pub command: String,
    /// Repository directory, relative to the config file.
    #[serde(default = "default_working_directory")]
    pub working_directory: String,
    /// File-name glob identifying a unit root.
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default)]
    pub strategy: OwnershipStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Units built on every run whether or not they changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub always_build: Vec<String>,
}

fn default_working_directory() -> String {
    ".".to_owned()
}

fn default_marker() -> String {
    "*.sln".to_owned()
}

/// How a changed path is mapped to its owning unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnershipStrategy {
    /// Walk up from the changed file's directory to the nearest marker.
    #[default]
    Ascent,
    /// Enumerate all markers once and pick the deepest enclosing one.
    PrefixScan,
}

impl ConfigFile {
    /// Read and parse a `multibuild.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// The starter configuration written by `multibuild init`.
    pub fn starter() -> Self {
        Self {
            build: BuildSection {
                command: format!("dotnet build \"{UNIT_PLACEHOLDER}\""),
                working_directory: default_working_directory(),
                marker: default_marker(),
                strategy: OwnershipStrategy::Ascent,
                timeout_secs: None,
                always_build: Vec::new(),
            },
        }
    }

    /// Serialize to human-readable TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    /// Validate the file and resolve its paths against `config_dir`.
    ///
    /// # Errors
    /// Returns an error if the command template, marker, or timeout is invalid.
    pub fn resolve(self, config_dir: &Path) -> Result<BuildConfig, ConfigError> {
        let build = self.build;
        let command = CommandTemplate::parse(&build.command)?;
        marker_pattern(&build.marker).map_err(|source| ConfigError::Marker { source })?;

        let timeout = match build.timeout_secs {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let working_directory = resolve_dir(config_dir, &build.working_directory)?;
        let always_build = build
            .always_build
            .iter()
            .map(|raw| BuildUnitId::resolve(raw, &working_directory))
            .collect();

        Ok(BuildConfig {
            command,
            working_directory,
            marker: build.marker,
            strategy: build.strategy,
            timeout,
            always_build,
        })
    }
}

fn resolve_dir(config_dir: &Path, raw: &str) -> Result<PathBuf, ConfigError> {
    let normalized = raw.replace('\\', "/");
    let dir = Path::new(&normalized);
    if dir.is_absolute() {
        return Ok(lexical_normalize(dir));
    }
    Ok(absolutize(&config_dir.join(dir))?)
}

/// Validated build configuration with every path made absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub command: CommandTemplate,
    pub working_directory: PathBuf,
    pub marker: String,
    pub strategy: OwnershipStrategy,
    pub timeout: Option<Duration>,
    pub always_build: Vec<BuildUnitId>,
}

impl BuildConfig {
    /// Read, validate, and resolve a `multibuild.toml`.
    ///
    /// Relative paths inside the file are taken relative to the file's directory.
    ///
    /// # Errors
    /// Returns an error if the file is missing, malformed, or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = ConfigFile::from_path(path)?;
        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        file.resolve(config_dir)
    }
}

/// A build command with exactly one `{unit}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    /// # Errors
    /// Returns an error unless `raw` contains the placeholder exactly once.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let count = raw.matches(UNIT_PLACEHOLDER).count();
        if count != 1 {
            return Err(ConfigError::InvalidTemplate {
                template: raw.to_owned(),
                count,
            });
        }
        Ok(Self(raw.to_owned()))
    }

    /// Substitute `unit` into the template.
    pub fn render(&self, unit: &BuildUnitId) -> String {
        self.0.replacen(UNIT_PLACEHOLDER, unit.as_str(), 1)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    fn parse(content: &str) -> ConfigFile {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let file = parse(
            r#"
[build]
command = "make -C {unit}"
"#,
        );
        assert_eq!(file.build.working_directory, ".");
        assert_eq!(file.build.marker, "*.sln");
        assert_eq!(file.build.strategy, OwnershipStrategy::Ascent);
        assert!(file.build.always_build.is_empty());
        assert!(file.build.timeout_secs.is_none());
    }

    #[test]
    fn strategy_is_kebab_case() {
        let file = parse(
            r#"
[build]
command = "b {unit}"
strategy = "prefix-scan"
"#,
        );
        assert_eq!(file.build.strategy, OwnershipStrategy::PrefixScan);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<ConfigFile, _> = toml::from_str(
            r#"
[build]
command = "b {unit}"
solutions = []
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_tables_are_rejected() {
        let result: Result<ConfigFile, _> = toml::from_str(
            r#"
[build]
command = "b {unit}"

[deploy]
target = "prod"
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("deploy"), "{err}");
    }

    #[test]
    fn resolve_makes_paths_absolute() {
        let file = parse(
            r#"
[build]
command = "b {unit}"
working_directory = "repo"
always_build = ["libs\\Shared\\Shared.sln", "/abs/X.sln"]
"#,
        );
        let config = file.resolve(Path::new("/etc/mb")).unwrap();
        assert_eq!(config.working_directory, PathBuf::from("/etc/mb/repo"));
        assert_eq!(
            config.always_build,
            vec![
                BuildUnitId::new("/etc/mb/repo/libs/Shared/Shared.sln"),
                BuildUnitId::new("/abs/X.sln"),
            ]
        );
    }

    #[test]
    fn resolve_rejects_zero_timeout() {
        let file = parse(
            r#"
[build]
command = "b {unit}"
timeout_secs = 0
"#,
        );
        let err = file.resolve(Path::new("/x")).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn resolve_converts_timeout() {
        let file = parse(
            r#"
[build]
command = "b {unit}"
timeout_secs = 90
"#,
        );
        let config = file.resolve(Path::new("/x")).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn resolve_rejects_bad_marker() {
        let file = parse(
            r#"
[build]
command = "b {unit}"
marker = "sub/*.sln"
"#,
        );
        let err = file.resolve(Path::new("/x")).unwrap_err();
        assert!(err.to_string().contains("invalid marker"), "{err}");
    }

    #[test]
    fn template_requires_exactly_one_placeholder() {
        assert!(CommandTemplate::parse("dotnet build").is_err());
        let err = CommandTemplate::parse("cp {unit} {unit}.bak").unwrap_err();
        assert!(err.to_string().contains("found 2"), "{err}");
        assert!(CommandTemplate::parse("dotnet build {unit}").is_ok());
    }

    #[test]
    fn template_renders_unit() {
        let template = CommandTemplate::parse("dotnet build \"{unit}\" -c Release").unwrap();
        let unit = BuildUnitId::new("/repo/App/App.sln");
        assert_eq!(
            template.render(&unit),
            "dotnet build \"/repo/App/App.sln\" -c Release"
        );
    }

    #[test]
    fn starter_round_trips() {
        let starter = ConfigFile::starter();
        let content = starter.to_toml().unwrap();
        assert!(!content.contains("always_build"), "content was: {content}");
        assert_eq!(parse(&content), starter);
        assert!(starter.resolve(Path::new("/x")).is_ok());
    }

    #[test]
    fn from_path_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = BuildConfig::from_path(&tmp.path().join("multibuild.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn from_path_malformed_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("multibuild.toml");
        fs::write(&path, "[build\ncommand = ").unwrap();
        let err = BuildConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn from_path_resolves_against_file_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("multibuild.toml");
        fs::write(
            &path,
            "[build]\ncommand = \"b {unit}\"\nworking_directory = \"src\"\n",
        )
        .unwrap();
        let config = BuildConfig::from_path(&path).unwrap();
        assert_eq!(config.working_directory, tmp.path().join("src"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn render_contains_unit_and_no_placeholder(
                prefix in "[a-z ]{0,12}",
                suffix in "[a-z -]{0,12}",
                unit in "/[a-zA-Z0-9/]{1,20}\\.sln",
            ) {
                let template = CommandTemplate::parse(&format!("{prefix}{{unit}}{suffix}")).unwrap();
                let rendered = template.render(&BuildUnitId::new(&unit));
                prop_assert_eq!(rendered, format!("{prefix}{unit}{suffix}"));
            }
        }
    }
}
