#![deny(unsafe_code)]

//! Configuration for Parley.
//!
//! Holds the per-backend connection settings ([`ProviderConfig`]) consumed by
//! the provider registry, and the optional TOML file format ([`AppConfig`]) a
//! host can use to keep those settings on disk.
//!
//! Parley itself never reads the environment; credentials arrive either
//! through a loaded file or directly from the host.

/// API credentials with zeroization and redaction.
pub mod credential;
/// Per-backend connection settings.
pub mod provider;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use credential::Credential;
pub use provider::{ProcessConfig, ProviderConfig};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level configuration file.
///
/// ## TOML Example
///
/// ```toml
/// default_provider = "anthropic"
///
/// [logging]
/// level = "debug"
///
/// [providers.anthropic]
/// api_key = "sk-ant-..."
///
/// [providers.gguf.process]
/// executable = "/usr/local/bin/llama-cli"
/// model_dir = "/var/lib/models"
/// threads = 8
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend used when the host does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connection settings keyed by backend name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
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

/// Provider tables are keyed case-insensitively: `[providers.OpenAI]` and
/// `[providers.openai]` name the same backend.
pub fn normalize_provider_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            providers = config.providers.len(),
            "Loaded provider configuration"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(s)?;
        let mut providers = BTreeMap::new();
        for (name, provider) in std::mem::take(&mut config.providers) {
            let key = normalize_provider_name(&name);
            if providers.insert(key.clone(), provider).is_some() {
                return Err(ConfigError::Validation(format!(
                    "provider table [providers.{name}] duplicates [providers.{key}]"
                )));
            }
        }
        config.providers = providers;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        if let Some(ref name) = self.default_provider {
            if !self.providers.contains_key(&normalize_provider_name(name)) {
                return Err(ConfigError::Validation(format!(
                    "default_provider {name:?} has no [providers.{name}] table"
                )));
            }
        }

        for (name, provider) in &self.providers {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "provider names must not be empty".to_string(),
                ));
            }
            if *name != normalize_provider_name(name) {
                return Err(ConfigError::Validation(format!(
                    "provider key {name:?} is not normalized (expected {:?})",
                    normalize_provider_name(name)
                )));
            }
            if let Some(ref url) = provider.base_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::Validation(format!(
                        "providers.{name}.base_url must start with http:// or https://, got {url:?}"
                    )));
                }
            }
            if let Some(ref process) = provider.process {
                if process.threads == 0 {
                    return Err(ConfigError::Validation(format!(
                        "providers.{name}.process.threads must be at least 1"
                    )));
                }
                if process.context_size == 0 {
                    return Err(ConfigError::Validation(format!(
                        "providers.{name}.process.context_size must be non-zero"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Connection settings for `name`, or empty settings when no table exists.
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers
            .get(&normalize_provider_name(name))
            .cloned()
            .unwrap_or_default()
    }
}
