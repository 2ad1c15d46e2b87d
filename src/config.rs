//! Engine metadata-folder configuration.
//!
//! The engine keeps its per-project settings in a metadata folder at the
//! project root (`.modshift` unless overridden). The only file read from it
//! is `config.toml`:
//!
//! ```toml
//! ignore = ["build", "third_party"]
//! ```
//!
//! Ignored names are excluded from resolution, project scanning, and import
//! rewriting. A missing config file yields the defaults.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default metadata folder name, relative to the project root.
pub const DEFAULT_METADATA_FOLDER: &str = ".modshift";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Directory or file names excluded from all project scanning.
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read engine config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse engine config TOML{}: {source}", path_suffix(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("invalid engine config{}: {source}", path_suffix(.path))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("ignore entries must not be empty")]
    EmptyIgnoreEntry,

    #[error("ignore entry `{entry}` must be a bare name, not a path")]
    PathInIgnoreEntry { entry: String },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for entry in &self.ignore {
            if entry.is_empty() {
                return Err(ValidationError::EmptyIgnoreEntry);
            }
            if entry.contains(['/', '\\']) {
                return Err(ValidationError::PathInIgnoreEntry {
                    entry: entry.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn load_from_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml_edit::de::from_str(input)
            .map_err(|source| ConfigError::Toml { path: None, source })?;
        config
            .validate()
            .map_err(|source| ConfigError::Validation { path: None, source })?;
        Ok(config)
    }

    /// Load `config.toml` from a metadata folder. Missing file is fine.
    pub fn load(metadata_folder: &Path) -> Result<Self, ConfigError> {
        let path = metadata_folder.join("config.toml");
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(EngineConfig::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        Self::load_from_str(&contents).map_err(|error| error.with_path(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join(".modshift")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_ignore_list() {
        let config = EngineConfig::load_from_str("ignore = [\"build\", \"vendor\"]").unwrap();
        assert_eq!(config.ignore, vec!["build", "vendor"]);
    }

    #[test]
    fn test_rejects_path_entries() {
        let err = EngineConfig::load_from_str("ignore = [\"a/b\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = EngineConfig::load_from_str("ignore = not-a-list").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join(".modshift");
        fs::create_dir(&meta).unwrap();
        fs::write(meta.join("config.toml"), "ignore = [\"build\"]").unwrap();

        let config = EngineConfig::load(&meta).unwrap();
        assert_eq!(config.ignore, vec!["build"]);
    }
}
