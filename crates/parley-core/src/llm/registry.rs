//! Backend selection: name in, validated provider out.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use parley_config::ProviderConfig;

use crate::build_info;

use super::backend::{Backend, Dialect};
use super::http::HttpProvider;
use super::process::ProcessProvider;
use super::provider::{Provider, ProviderError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds providers by backend name.
///
/// Holds one `reqwest::Client` shared by every HTTP provider it creates, so
/// connection pools are reused across backends.
#[derive(Clone)]
pub struct Registry {
    client: Client,
}

impl Registry {
    /// A registry with a fresh client identifying itself as `parley/<version>`.
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(build_info::user_agent())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// A registry that hands out providers using the caller's client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn supported() -> &'static [Backend] {
        Backend::all()
    }

    pub fn is_supported(name: &str) -> bool {
        Backend::from_name(name).is_some()
    }

    /// Validate `config` for the named backend and construct its provider.
    pub fn get_provider(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<Box<dyn Provider>, ProviderError> {
        let backend = Backend::from_name(name)
            .ok_or_else(|| ProviderError::UnsupportedBackend(name.trim().to_string()))?;
        validate(backend, config)?;

        debug!(backend = %backend, "creating provider");
        let provider: Box<dyn Provider> = match backend.dialect() {
            Dialect::Process => Box::new(ProcessProvider::new(config)),
            _ => Box::new(HttpProvider::new(backend, self.client.clone(), config)?),
        };
        Ok(provider)
    }
}

fn validate(backend: Backend, config: &ProviderConfig) -> Result<(), ProviderError> {
    if backend.requires_credential() && config.credential().is_none() {
        return Err(ProviderError::Configuration(format!(
            "{backend} requires an API key"
        )));
    }

    if backend.dialect() == Dialect::Process {
        let process = config.process.as_ref().ok_or_else(|| {
            ProviderError::Configuration(format!("{backend} requires process settings"))
        })?;
        if process.executable.as_os_str().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "{backend} requires an inference executable path"
            )));
        }
        if process.model_dir.as_os_str().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "{backend} requires a model directory"
            )));
        }
    }

    Ok(())
}
