//! Configuration file discovery and loading

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Locate the Setlist configuration file for the platform
///
/// Checks the per-user config directory first, then the system-wide location
/// on Linux. Returns an error when no config file exists; callers treat that
/// as "environment variables only".
pub fn find_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/setlist/config.toml first, then /etc/setlist/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("setlist").join("config.toml"));
        let system_config = PathBuf::from("/etc/setlist/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        let path = dirs::config_dir()
            .map(|d| d.join("setlist").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    } else {
        Err(Error::Config("Unsupported platform".to_string()))
    }
}

/// Parse a TOML config file into a generic value tree
///
/// Key extraction is left to the service crate, which knows its own schema.
pub fn load_toml(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Fetch a string key from a TOML table, treating blank values as absent
pub fn toml_string(config: &toml::Value, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
