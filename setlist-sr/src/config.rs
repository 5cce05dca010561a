//! Configuration resolution for setlist-sr
//!
//! Provides two-tier configuration resolution with ENV → TOML priority and
//! compiled defaults for non-secret keys. Secrets (generation API key, catalog
//! client credentials) have no default and fail with an actionable message.

use serde::Serialize;
use setlist_common::config::{find_config_file, load_toml, toml_string};
use setlist_common::{Error, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind port
pub const DEFAULT_PORT: u16 = 5730;
/// Default Generation Service endpoint (OpenAI-compatible chat completions)
pub const DEFAULT_GENERATION_API_BASE: &str = "https://api.openai.com/v1";
/// Default generation model
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";
/// Default Catalog Service endpoint
pub const DEFAULT_CATALOG_API_BASE: &str = "https://api.spotify.com/v1";
/// Default catalog token endpoint (client-credentials grant)
pub const DEFAULT_CATALOG_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Generation Service client settings
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    /// Base URL of the chat-completions API
    pub api_base: String,
    /// Bearer key for the generation API
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model identifier passed on every request
    pub model: String,
}

/// Catalog Service client settings
#[derive(Debug, Clone, Serialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog search API
    pub api_base: String,
    /// Token endpoint for the client-credentials grant
    pub token_url: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Optional market filter forwarded on search requests
    pub market: Option<String>,
}

/// Resolved service configuration
#[derive(Debug, Clone, Serialize)]
pub struct SrConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Generation Service settings
    pub generation: GenerationConfig,
    /// Catalog Service settings
    pub catalog: CatalogConfig,
}

impl SrConfig {
    /// Load configuration with ENV → TOML → default priority
    ///
    /// `config_path` overrides platform config-file discovery; when it is
    /// `None` and no config file exists, resolution proceeds from environment
    /// variables and defaults alone.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let toml = match config_path {
            Some(path) => {
                info!("Using config file: {}", path.display());
                load_toml(path)?
            }
            None => match find_config_file() {
                Ok(path) => {
                    info!("Using config file: {}", path.display());
                    load_toml(&path)?
                }
                Err(_) => {
                    debug!("No config file found; using environment variables and defaults");
                    toml::Value::Table(Default::default())
                }
            },
        };

        Self::from_toml(&toml)
    }

    /// Resolve every key against an already-parsed TOML table
    pub fn from_toml(toml: &toml::Value) -> Result<Self> {
        let host = resolve_key(
            "Bind host",
            "SETLIST_SR_HOST",
            "host",
            toml,
            Some(DEFAULT_HOST),
        )?;
        let port = resolve_port(toml)?;

        let generation = GenerationConfig {
            api_base: resolve_key(
                "Generation API base URL",
                "SETLIST_GENERATION_API_BASE",
                "generation_api_base",
                toml,
                Some(DEFAULT_GENERATION_API_BASE),
            )?,
            api_key: resolve_key(
                "Generation API key",
                "SETLIST_GENERATION_API_KEY",
                "generation_api_key",
                toml,
                None,
            )?,
            model: resolve_key(
                "Generation model",
                "SETLIST_GENERATION_MODEL",
                "generation_model",
                toml,
                Some(DEFAULT_GENERATION_MODEL),
            )?,
        };

        let catalog = CatalogConfig {
            api_base: resolve_key(
                "Catalog API base URL",
                "SETLIST_CATALOG_API_BASE",
                "catalog_api_base",
                toml,
                Some(DEFAULT_CATALOG_API_BASE),
            )?,
            token_url: resolve_key(
                "Catalog token URL",
                "SETLIST_CATALOG_TOKEN_URL",
                "catalog_token_url",
                toml,
                Some(DEFAULT_CATALOG_TOKEN_URL),
            )?,
            client_id: resolve_key(
                "Catalog client id",
                "SETLIST_CATALOG_CLIENT_ID",
                "catalog_client_id",
                toml,
                None,
            )?,
            client_secret: resolve_key(
                "Catalog client secret",
                "SETLIST_CATALOG_CLIENT_SECRET",
                "catalog_client_secret",
                toml,
                None,
            )?,
            market: resolve_optional("SETLIST_CATALOG_MARKET", "catalog_market", toml),
        };

        Ok(Self {
            host,
            port,
            generation,
            catalog,
        })
    }
}

/// Validate a config value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve one string key from ENV → TOML → default
///
/// Warns when multiple sources define the key (potential misconfiguration).
/// Required keys (no default) fail with a message listing every way to set
/// them.
fn resolve_key(
    label: &str,
    env_var: &str,
    toml_key: &str,
    toml: &toml::Value,
    default: Option<&str>,
) -> Result<String> {
    let mut sources = Vec::new();

    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    if env_value.is_some() {
        sources.push("environment");
    }

    let toml_value = toml_string(toml, toml_key);
    if toml_value.is_some() {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using environment (highest priority).",
            label,
            sources.join(", ")
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", label);
        return Ok(value.trim().to_string());
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", label);
        return Ok(value);
    }

    if let Some(value) = default {
        return Ok(value.to_string());
    }

    Err(Error::Config(format!(
        "{} not configured. Please configure using one of:\n\
         1. Environment: {}=<value>\n\
         2. TOML config: ~/.config/setlist/config.toml ({} = \"<value>\")",
        label, env_var, toml_key
    )))
}

/// Resolve one optional string key from ENV → TOML, absent when neither is set
fn resolve_optional(env_var: &str, toml_key: &str, toml: &toml::Value) -> Option<String> {
    if let Some(value) = std::env::var(env_var).ok().filter(|v| is_valid_key(v)) {
        return Some(value.trim().to_string());
    }
    toml_string(toml, toml_key)
}

/// Resolve the bind port, accepting ENV strings and TOML integers
fn resolve_port(toml: &toml::Value) -> Result<u16> {
    if let Ok(value) = std::env::var("SETLIST_SR_PORT") {
        if is_valid_key(&value) {
            return value.trim().parse::<u16>().map_err(|_| {
                Error::Config(format!("Invalid SETLIST_SR_PORT value: {}", value))
            });
        }
    }

    if let Some(value) = toml.get("port") {
        let port = value
            .as_integer()
            .filter(|p| (1..=u16::MAX as i64).contains(p))
            .ok_or_else(|| Error::Config(format!("Invalid port in TOML config: {}", value)))?;
        return Ok(port as u16);
    }

    Ok(DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_resolve_port_rejects_out_of_range_toml() {
        std::env::remove_var("SETLIST_SR_PORT");
        let toml: toml::Value = toml::from_str("port = 99999").expect("parse");
        assert!(matches!(resolve_port(&toml), Err(Error::Config(_))));
    }
}
