//! Configuration management for weft.
//!
//! Loads configuration from ${WEFT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::translator::TranslatorOptions;

/// Replay provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayProviderConfig {
    /// Default JSON Lines file to replay when no input is given.
    pub path: Option<String>,
}

impl ReplayProviderConfig {
    /// Returns the effective path if set and non-empty.
    pub fn effective_path(&self) -> Option<&str> {
        self.path.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// HTTP (SSE) provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpProviderConfig {
    /// Optional API key (overrides environment variable).
    pub api_key: Option<String>,
    /// Optional API base URL.
    pub base_url: Option<String>,
    /// Connect timeout in seconds (0 disables)
    pub timeout_secs: u64,
}

impl HttpProviderConfig {
    /// Returns the connect timeout, or `None` when disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Provider configuration, keyed by provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub replay: ReplayProviderConfig,
    pub http: HttpProviderConfig,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used when the model has no `provider:` prefix
    pub provider: String,

    /// Model identifier passed to the provider
    pub model: String,

    /// Optional log file; logs go to stderr when unset
    pub log_file: Option<String>,

    /// Translator behaviour
    pub translator: TranslatorOptions,

    /// Provider configuration (base URLs, files, etc.)
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Self::DEFAULT_PROVIDER.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            log_file: None,
            translator: TranslatorOptions::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    const DEFAULT_PROVIDER: &str = "replay";
    const DEFAULT_MODEL: &str = "default";

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the default config template to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for weft configuration.
    //!
    //! WEFT_HOME resolution order:
    //! 1. WEFT_HOME environment variable (if set)
    //! 2. ~/.config/weft (default)
    //! 3. ./.weft when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the weft home directory.
    pub fn weft_home() -> PathBuf {
        if let Ok(home) = std::env::var("WEFT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".weft"),
            |h| h.join(".config").join("weft"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        weft_home().join("config.toml")
    }
}
