//! Configuration builders for tests.

use parley_config::{AppConfig, ProviderConfig, normalize_provider_name};

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .provider("ollama", local_provider("http://127.0.0.1:9999"))
///     .default_provider("ollama")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// Name the default backend. Matching is case-insensitive, as in TOML.
    pub fn default_provider(mut self, name: &str) -> Self {
        self.config.default_provider = Some(name.to_string());
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    /// Add a provider table, keyed the way [`AppConfig::parse`] keys it.
    pub fn provider(mut self, name: &str, provider: ProviderConfig) -> Self {
        self.config
            .providers
            .insert(normalize_provider_name(name), provider);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for a keyed backend pointed at `base_url` (usually a mock).
pub fn keyed_provider(api_key: &str, base_url: &str) -> ProviderConfig {
    ProviderConfig::default()
        .with_api_key(api_key)
        .with_base_url(base_url)
}

/// Settings for a keyless local backend pointed at `base_url`.
pub fn local_provider(base_url: &str) -> ProviderConfig {
    ProviderConfig::default().with_base_url(base_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_output_validates() {
        let config = TestConfigBuilder::new()
            .provider("openai", keyed_provider("sk", "http://127.0.0.1:1/v1"))
            .default_provider("openai")
            .log_level("debug")
            .build();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.provider("openai").base_url.as_deref(),
            Some("http://127.0.0.1:1/v1")
        );
    }

    #[test]
    fn test_builder_keys_match_parser() {
        let config = TestConfigBuilder::new()
            .provider(" Ollama ", local_provider("http://127.0.0.1:11434"))
            .default_provider("OLLAMA")
            .build();
        assert!(config.validate().is_ok());
        assert!(config.providers.contains_key("ollama"));

        let parsed = AppConfig::parse(
            "default_provider = \"OLLAMA\"\n[providers.\" Ollama \"]\nbase_url = \"http://127.0.0.1:11434\"\n",
        )
        .unwrap();
        assert_eq!(
            parsed.providers.keys().collect::<Vec<_>>(),
            config.providers.keys().collect::<Vec<_>>()
        );
    }
}
