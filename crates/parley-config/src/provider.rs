//! Per-backend connection settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::credential::Credential;

/// Connection data for one backend.
///
/// Every field is optional; which ones a backend needs is decided by the
/// registry when the provider is constructed.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key or bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Credential>,

    /// Base endpoint override (e.g. `http://localhost:11434`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Local inference binary settings. Only the process-backed backend reads this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessConfig>,
}

impl ProviderConfig {
    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<Credential>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the local process configuration.
    pub fn with_process(mut self, process: ProcessConfig) -> Self {
        self.process = Some(process);
        self
    }

    /// The credential, if one is present and non-empty.
    pub fn credential(&self) -> Option<&Credential> {
        self.api_key.as_ref().filter(|key| !key.is_empty())
    }

    /// The configured base URL without a trailing slash, or `default`.
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
    }
}

/// Settings for spawning a local inference binary (llama.cpp style).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Path to the inference executable.
    pub executable: PathBuf,

    /// Directory holding `.gguf` / `.bin` model files.
    pub model_dir: PathBuf,

    /// CPU threads passed with `-t`.
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// Context window passed with `-c`.
    #[serde(default = "default_context_size")]
    pub context_size: u32,
}

impl ProcessConfig {
    /// Create a process config with default thread count and context size.
    pub fn new(executable: impl Into<PathBuf>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            model_dir: model_dir.into(),
            threads: default_threads(),
            context_size: default_context_size(),
        }
    }

    /// Set the thread count.
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Set the context size.
    pub fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = context_size;
        self
    }
}

fn default_threads() -> u32 {
    4
}

fn default_context_size() -> u32 {
    2048
}
