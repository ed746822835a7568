use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories_next::ProjectDirs;
use renderer::{ExportBackend, Extent, GpuPowerPreference};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::cli;

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "gblur";
const APPLICATION: &str = "gblur";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings read from `config.toml`. Every value is optional; command-line
/// flags win over anything set here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub gpu: GpuSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub shaders: ShaderSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub size: Option<Extent>,
    pub title: Option<String>,
    pub vsync: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpuSection {
    #[serde(default, deserialize_with = "deserialize_power_opt")]
    pub power: Option<GpuPowerPreference>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSection {
    #[serde(default, deserialize_with = "deserialize_backend_opt")]
    pub backend: Option<ExportBackend>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShaderSection {
    pub dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(title) = self.window.title.as_deref() {
            if title.trim().is_empty() {
                return Err(ConfigError::Invalid("window.title must not be empty".into()));
            }
        }
        if let Some(dir) = self.shaders.dir.as_deref() {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("shaders.dir must not be empty".into()));
            }
        }
        Ok(())
    }
}

/// Loads the config file.
///
/// An explicitly named file must exist. The default location is optional and
/// yields an empty config when absent.
pub fn load(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => {
                tracing::debug!("no user config directory; using built-in defaults");
                return Ok(FileConfig::default());
            }
        },
    };

    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            tracing::debug!(path = %path.display(), "config file not found; using defaults");
            return Ok(FileConfig::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let config = FileConfig::from_toml_str(&contents)
        .map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
    config.validate()?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<Extent>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    value
        .map(|raw| cli::parse_size(&raw).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_power_opt<'de, D>(deserializer: D) -> Result<Option<GpuPowerPreference>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    value
        .map(|raw| cli::parse_power(&raw).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_backend_opt<'de, D>(deserializer: D) -> Result<Option<ExportBackend>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    value
        .map(|raw| cli::parse_backend(&raw).map_err(de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[window]
size = "1280x720"
title = "blur test"
vsync = false

[gpu]
power = "low"

[export]
backend = "cpu"

[shaders]
dir = "/opt/gblur/shaders"
"#;

    #[test]
    fn parses_every_section() {
        let config = FileConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.size, Some(Extent::new(1280, 720)));
        assert_eq!(config.window.title.as_deref(), Some("blur test"));
        assert_eq!(config.window.vsync, Some(false));
        assert_eq!(config.gpu.power, Some(GpuPowerPreference::Low));
        assert_eq!(config.export.backend, Some(ExportBackend::Cpu));
        assert_eq!(
            config.shaders.dir.as_deref(),
            Some(Path::new("/opt/gblur/shaders"))
        );
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = FileConfig::from_toml_str("").expect("parse config");
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn rejects_bad_values_and_unknown_keys() {
        assert!(FileConfig::from_toml_str("[window]\nsize = \"0x10\"\n").is_err());
        assert!(FileConfig::from_toml_str("[gpu]\npower = \"turbo\"\n").is_err());
        assert!(FileConfig::from_toml_str("[window]\nfullscreen = true\n").is_err());
        assert!(FileConfig::from_toml_str("strategy = 2\n").is_err());
    }

    #[test]
    fn validate_rejects_blank_title() {
        let config = FileConfig::from_toml_str("[window]\ntitle = \"  \"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[window\n").unwrap();
        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gblur.toml");
        fs::write(&path, SAMPLE).unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.export.backend, Some(ExportBackend::Cpu));
    }
}
