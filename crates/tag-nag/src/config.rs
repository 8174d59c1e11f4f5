//! `.tag-nag.yml` configuration file
//!
//! ```yaml
//! tags:
//!   - key: Owner
//!   - key: Environment
//!     values: [Dev, Prod]
//! settings:
//!   case_insensitive: false
//!   dry_run: false
//! skip:
//!   - modules/legacy
//! ```
use crate::tags::{Casing, TagSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Looked up in this order
pub const CONFIG_FILE_NAMES: [&str; 2] = [".tag-nag.yml", ".tag-nag.yaml"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tags: Vec<TagDefinition>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub skip: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagDefinition {
    pub key: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl Config {
    /// Loads the first config file found in `dir`, `None` if there is none
    pub fn find(dir: &Path) -> Result<Option<(PathBuf, Config)>, ConfigError> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                let config = Self::load(&path)?;
                return Ok(Some((path, config)));
            }
        }

        Ok(None)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        tracing::info!(path=%path.display(), "loading config");

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        Self::from_yaml(&text).map_err(|source| ConfigError::Invalid {
            path: path.to_owned(),
            source: Box::new(source),
        })
    }

    pub fn from_yaml(text: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;

        if let Some(position) = config.tags.iter().position(|tag| tag.key.trim().is_empty()) {
            return Err(ConfigError::EmptyTagKey(position));
        }

        Ok(config)
    }

    pub fn tag_spec(&self) -> TagSpec {
        self.tags
            .iter()
            .map(|tag| (tag.key.trim(), tag.values.clone()))
            .collect()
    }

    pub fn casing(&self) -> Casing {
        Casing::from_insensitive_flag(self.settings.case_insensitive)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },
    #[error("Unable to parse config")]
    Parse(#[from] serde_yaml::Error),
    #[error("Tag definition #{} has an empty key", .0 + 1)]
    EmptyTagKey(usize),
}
