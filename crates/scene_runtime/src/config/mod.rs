//! Configuration system
//!
//! Runtime settings load from TOML or RON, chosen by file extension.

pub use serde::{Serialize, Deserialize};

use crate::scene::Optics;

/// File formats understood by [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            Ok(Self::Toml)
        } else if path.ends_with(".ron") {
            Ok(Self::Ron)
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }
}

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        match format {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Log verbosity accepted in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Logging disabled
    Off,
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Lifecycle messages
    #[default]
    Info,
    /// Resource and subscription detail
    Debug,
    /// Per-frame detail
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

/// Settings for a [`crate::SceneRuntime`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Log verbosity used by [`crate::foundation::logging::init_with_config`]
    pub log_level: LogLevel,

    /// Prefix for resource ids generated when a node supplies none
    pub resource_id_prefix: String,

    /// Initial capacity of every per-surface traversal stack
    pub initial_stack_capacity: usize,

    /// Optics used by projection nodes built without explicit settings
    pub default_optics: Optics,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            resource_id_prefix: "morph".to_string(),
            initial_stack_capacity: 16,
            default_optics: Optics::default(),
        }
    }
}

impl Config for RuntimeConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_toml_round_trip() {
        let config = RuntimeConfig {
            log_level: LogLevel::Debug,
            resource_id_prefix: "blend".to_string(),
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed: RuntimeConfig = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed: RuntimeConfig = ron::from_str("(resource_id_prefix: \"m\")").expect("parse");
        assert_eq!(parsed.resource_id_prefix, "m");
        assert_eq!(parsed.initial_stack_capacity, 16);
        assert_eq!(parsed.log_level, LogLevel::Info);
    }

    #[test]
    fn test_unknown_optics_tag_is_rejected() {
        let text = "resource_id_prefix = \"m\"\n[default_optics]\ntype = \"fisheye\"\nfovy = 90.0\n";
        assert!(toml::from_str::<RuntimeConfig>(text).is_err());
    }

    fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    fn custom_config() -> RuntimeConfig {
        RuntimeConfig {
            log_level: LogLevel::Warn,
            resource_id_prefix: "saved".to_string(),
            initial_stack_capacity: 4,
            default_optics: Optics::ortho(-2.0, 2.0, -1.0, 1.0, 0.5, 50.0).expect("valid optics"),
        }
    }

    #[test]
    fn test_save_and_load_toml_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = path_in(&dir, "runtime.toml");
        let config = custom_config();

        config.save_to_file(&path).expect("save");
        let loaded = RuntimeConfig::load_from_file(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_and_load_ron_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = path_in(&dir, "runtime.ron");
        let config = custom_config();

        config.save_to_file(&path).expect("save");
        let loaded = RuntimeConfig::load_from_file(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_existing_file_with_unsupported_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = path_in(&dir, "runtime.json");
        std::fs::write(&path, "{\"resource_id_prefix\": \"m\"}").expect("write");

        let result = RuntimeConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ref p)) if p == &path));
    }

    #[test]
    fn test_save_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = path_in(&dir, "runtime.yaml");

        let result = RuntimeConfig::default().save_to_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
        assert!(!dir.path().join("runtime.yaml").exists());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = RuntimeConfig::load_from_file(&path_in(&dir, "absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = path_in(&dir, "broken.ron");
        std::fs::write(&path, "(log_level: loud)").expect("write");

        assert!(matches!(RuntimeConfig::load_from_file(&path), Err(ConfigError::Parse(_))));
    }
}
