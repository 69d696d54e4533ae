//! YAML configuration
//!
//! ```yaml
//! database: /var/lib/researchgraph/graph.db
//! merge_policy: strict
//! allowed_properties: [comment, url_main, url_other, note]
//! log_level: info
//! ```
//!
//! Every field is optional. A missing file means defaults.

use crate::graph::PropertyName;
use crate::merge::{MergePolicy, MergeSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Node fields that can never be extra properties
const RESERVED_PROPERTY_NAMES: [&str; 5] = ["key", "name", "category", "value", "history"];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database file; defaults to `<data_dir>/researchgraph/graph.db`
    pub database: Option<PathBuf>,
    pub merge_policy: MergePolicy,
    /// Extra property names the strict policy keeps, in order
    pub allowed_properties: Vec<String>,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            merge_policy: MergePolicy::default(),
            allowed_properties: PropertyName::well_known()
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            log_level: None,
        }
    }
}

impl Config {
    /// Parse and validate YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document is a valid, all-default config
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file that must exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load `explicit` if given; otherwise the default location if a file
    /// exists there; otherwise defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/researchgraph/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("researchgraph").join("config.yaml"))
    }

    /// The configured database path, or `<data_dir>/researchgraph/graph.db`
    pub fn database_path(&self) -> PathBuf {
        if let Some(ref path) = self.database {
            return path.clone();
        }
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        data_dir.join("researchgraph").join("graph.db")
    }

    /// Normalize the allow-list and reject invalid entries
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let mut seen: Vec<String> = Vec::with_capacity(self.allowed_properties.len());
        for raw in &self.allowed_properties {
            let name = raw.trim().to_lowercase();
            if name.is_empty() {
                return Err(ConfigError::Invalid("empty property name in allowed_properties".into()));
            }
            if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
                return Err(ConfigError::Invalid(format!(
                    "property name '{}' may only contain a-z, 0-9 and _",
                    raw
                )));
            }
            if RESERVED_PROPERTY_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is a node field and cannot be an extra property",
                    name
                )));
            }
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        self.allowed_properties = seen;

        if let Some(ref level) = self.log_level {
            let level = level.trim().to_lowercase();
            if !LOG_LEVELS.contains(&level.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "unknown log_level '{}' (expected one of {})",
                    level,
                    LOG_LEVELS.join(", ")
                )));
            }
            self.log_level = Some(level);
        }
        Ok(())
    }

    pub fn merge_settings(&self) -> MergeSettings {
        MergeSettings::new(self.merge_policy).with_allowed_properties(
            self.allowed_properties
                .iter()
                .map(|name| PropertyName::from(name.as_str())),
        )
    }
}
