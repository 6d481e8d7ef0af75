//! Configuration loading and config file resolution
//!
//! Bootstrap settings come from a small TOML file. The file is located in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`<config_dir>/mmx/mmxd.toml`)
//! 4. System config (`/etc/mmx/mmxd.toml`, Linux only)
//!
//! A missing file is not an error: compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the bootstrap config file
pub const CONFIG_ENV_VAR: &str = "MMX_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// IPC endpoint clients connect to
    #[serde(default = "default_ipc_socket")]
    pub ipc_socket: String,

    /// Output plugin name used to derive the volume proxy key
    #[serde(default = "default_output_plugin")]
    pub output_plugin: String,

    /// Extra plugin search directory
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,

    /// Where runtime config properties are persisted
    #[serde(default)]
    pub property_file: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            ipc_socket: default_ipc_socket(),
            output_plugin: default_output_plugin(),
            plugin_dir: None,
            property_file: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_ipc_socket() -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
    format!("unix:///tmp/mmx-ipc-{}", user)
}

fn default_output_plugin() -> String {
    if cfg!(target_os = "linux") {
        "alsa".to_string()
    } else if cfg!(target_os = "macos") {
        "coreaudio".to_string()
    } else {
        "null".to_string()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from `path`, or compiled defaults when there is none
    ///
    /// A path that does not exist produces a warning and defaults. A file
    /// that exists but cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file found, using compiled defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file {:?} does not exist, using compiled defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Property file path, falling back to the platform default
    pub fn property_file_or_default(&self) -> Option<PathBuf> {
        self.property_file.clone().or_else(default_property_file)
    }
}

/// Config file resolution following the priority order in the module docs
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("mmx").join("mmxd.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System config
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mmx/mmxd.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Default location of the persisted property store
pub fn default_property_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mmx").join("properties.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = DaemonConfig::from_toml_str("output_plugin = \"pulse\"\n").unwrap();
        assert_eq!(config.output_plugin, "pulse");
        assert_eq!(config.ipc_socket, default_ipc_socket());
        assert_eq!(config.logging.level, "info");
        assert!(config.plugin_dir.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = DaemonConfig::from_toml_str("output_plugin = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        assert_eq!(DaemonConfig::load(None).unwrap(), DaemonConfig::default());
    }
}
