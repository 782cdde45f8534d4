//! Configuration management
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (wire-schemas.toml)
//! - Environment variables (WIRE_SCHEMAS__*)
//!
//! ## Example config file (wire-schemas.toml):
//! ```toml
//! [wire]
//! max_depth = 64
//! max_payload = 16777216
//!
//! [build]
//! cycles = "reject"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::wire::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAYLOAD};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Wire decoding limits
    #[serde(default)]
    pub wire: WireConfig,

    /// Scheme construction settings
    #[serde(default)]
    pub build: BuildConfig,
}

/// Limits applied to every view the registry reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConfig {
    /// Maximum nesting depth of a shape
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum encoded size in bytes
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,
}

/// How name-level dependency cycles between schemes are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Log a warning and keep every scheme
    #[default]
    Allow,
    /// Fail construction with `SchemaError::CyclicDependency`
    Reject,
}

/// Scheme construction settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub cycles: CyclePolicy,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_payload() -> usize {
    DEFAULT_MAX_PAYLOAD
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_payload: default_max_payload(),
        }
    }
}

impl SchemaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "wire-schemas.toml",
            ".wire-schemas.toml",
            "config/wire-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "wire", "wire-schemas") {
            let xdg_config = config_dir.config_dir().join("wire-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("WIRE_SCHEMAS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert_eq!(config.wire.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.wire.max_payload, DEFAULT_MAX_PAYLOAD);
        assert_eq!(config.build.cycles, CyclePolicy::Allow);
    }

    #[test]
    fn test_serialize_config() {
        let config = SchemaConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[wire]"));
        assert!(toml_str.contains("[build]"));
        assert!(toml_str.contains("cycles = \"allow\""));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[wire]\nmax_depth = 8\n\n[build]\ncycles = \"reject\"\n").unwrap();

        let config = SchemaConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.wire.max_depth, 8);
        assert_eq!(config.wire.max_payload, DEFAULT_MAX_PAYLOAD);
        assert_eq!(config.build.cycles, CyclePolicy::Reject);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = SchemaConfig::default();
        config.wire.max_depth = 12;
        config.save(path.to_str().unwrap()).unwrap();

        let reloaded = SchemaConfig::load_from(path.to_str()).unwrap();
        assert_eq!(reloaded.wire.max_depth, 12);
    }
}
