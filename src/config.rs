//! Scan configuration (span-cache.toml)
//!
//! Values from the file are the base layer; CLI flags override them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "span-cache.toml";

/// Error types for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

fn default_true() -> bool {
    true
}

/// Directory scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Cache directory holding span files
    #[serde(default)]
    pub cache_dir: PathBuf,

    /// Rename legacy (v1) file names to the current format while scanning
    #[serde(default = "default_true")]
    pub upgrade_legacy: bool,

    /// Delete files that are not cache entries
    #[serde(default)]
    pub remove_invalid: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::new(),
            upgrade_legacy: true,
            remove_invalid: false,
        }
    }
}

impl ScanConfig {
    /// Scan settings for `cache_dir` with defaults otherwise.
    pub fn for_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Load and parse config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Parse config from a TOML string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = toml::from_str(s)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "'cache_dir' must be set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert!(config.upgrade_legacy);
        assert!(!config.remove_invalid);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_full() {
        let config = ScanConfig::from_str(
            r#"
cache_dir = "/var/cache/media"
upgrade_legacy = false
remove_invalid = true
"#,
        )
        .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/media"));
        assert!(!config.upgrade_legacy);
        assert!(config.remove_invalid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_uses_defaults() {
        let config = ScanConfig::from_str(r#"cache_dir = "cache""#).unwrap();
        assert_eq!(config, ScanConfig::for_dir("cache"));
    }

    #[test]
    fn test_parse_error() {
        let err = ScanConfig::from_str("upgrade_legacy = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = ScanConfig::from_file(Path::new("/nonexistent/span-cache.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
