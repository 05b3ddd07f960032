//! Engine configuration management for `devtools.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                          |
//! |--------------|--------------------------------------------------|
//! | `[platform]` | Override platform endpoint (url, project key)    |
//! | `[rewrite]`  | Rewrite behavior (marker attribute)              |
//! | `[serve]`    | Development server (port, interface, root)       |
//!
//! All sections are optional; a missing config file yields defaults. The
//! file is searched upward from the working directory so the tool can run
//! from anywhere inside a project.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Default config file name.
pub const CONFIG_FILE: &str = "devtools.toml";

// ============================================================================
// Errors
// ============================================================================

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// Root configuration
// ============================================================================

/// Root configuration structure representing devtools.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Override platform endpoint settings
    pub platform: PlatformConfig,

    /// Rewrite behavior settings
    pub rewrite: RewriteConfig,

    /// Development server settings
    pub serve: ServeConfig,
}

impl EngineConfig {
    /// Load configuration.
    ///
    /// With an explicit path, the file must exist. Otherwise searches upward
    /// from cwd for `devtools.toml` and falls back to defaults when no file
    /// is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(CONFIG_FILE)?,
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let mut config = Self::from_path(&path)?;
        config.config_path = path;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.rewrite.data_attribute.is_empty() {
            return Err(ConfigError::Validation(
                "rewrite.data_attribute must not be empty".to_string(),
            )
            .into());
        }
        if !self
            .rewrite
            .data_attribute
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ConfigError::Validation(format!(
                "rewrite.data_attribute `{}` contains invalid characters",
                self.rewrite.data_attribute
            ))
            .into());
        }
        Ok(())
    }
}

/// Search upward from cwd for the config file.
fn find_config_file(name: &str) -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to get current working directory")?;
    let mut dir = cwd.as_path();
    loop {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Ok(None),
        }
    }
}

// ============================================================================
// [platform]
// ============================================================================

/// Override platform endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL of the override platform.
    pub url: String,

    /// Project key identifying which project's overrides to fetch.
    pub project_key: String,

    /// How long fetched override sets stay cached, in seconds.
    pub cache_ttl_seconds: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: "https://devtools.prairiegiraffe.com".to_string(),
            project_key: "proj_em8foyyu".to_string(),
            cache_ttl_seconds: 300,
        }
    }
}

// ============================================================================
// [rewrite]
// ============================================================================

/// Rewrite behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Attribute marking editable regions (`data-content` by default).
    pub data_attribute: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            data_attribute: crate::engine::DEFAULT_DATA_ATTRIBUTE.to_string(),
        }
    }
}

// ============================================================================
// [serve]
// ============================================================================

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// Directory of static files to serve.
    pub root: PathBuf,

    /// JSON file holding the override sets served locally.
    pub overrides_file: Option<PathBuf>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5277,
            root: PathBuf::from("dist"),
            overrides_file: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_str("").unwrap();
        assert_eq!(config.platform.cache_ttl_seconds, 300);
        assert_eq!(config.rewrite.data_attribute, "data-content");
        assert_eq!(config.serve.port, 5277);
        assert_eq!(config.serve.root, PathBuf::from("dist"));
    }

    #[test]
    fn test_parse_sections() {
        let config = EngineConfig::from_str(
            r#"
            [platform]
            url = "https://platform.example.com"
            project_key = "proj_abc"
            cache_ttl_seconds = 60

            [rewrite]
            data_attribute = "data-edit"

            [serve]
            interface = "0.0.0.0"
            port = 8080
            root = "public"
        "#,
        )
        .unwrap();

        assert_eq!(config.platform.url, "https://platform.example.com");
        assert_eq!(config.platform.project_key, "proj_abc");
        assert_eq!(config.platform.cache_ttl_seconds, 60);
        assert_eq!(config.rewrite.data_attribute, "data-edit");
        assert_eq!(
            config.serve.interface,
            IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
        );
        assert_eq!(config.serve.port, 8080);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(EngineConfig::from_str("[platform").is_err());
    }

    #[test]
    fn test_data_attribute_validation() {
        let mut config = EngineConfig::from_str("[rewrite]\ndata_attribute = \"\"").unwrap();
        assert!(config.validate().is_err());

        config.rewrite.data_attribute = "data content".to_string();
        assert!(config.validate().is_err());

        config.rewrite.data_attribute = "data-content".to_string();
        assert!(config.validate().is_ok());
    }
}
