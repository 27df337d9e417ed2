//! Provider trait: the one contract every backend implements.
//!
//! HTTP backends and the local process backend both sit behind this
//! interface, so callers can hold a `Box<dyn Provider>` without caring
//! where tokens come from.

use crate::{BoxFuture, BoxStream};

use super::types::{CallOptions, Message};

/// A lazy, finite stream of text increments.
///
/// An `Err` item means the transport failed mid-body; it is always the last
/// item. Dropping the stream releases the response body or the child process.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

/// Coarse error classification for callers that only need to know whose
/// fault a failure was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid settings, detected before any I/O.
    Configuration,
    /// The backend (remote service or local binary) failed or refused.
    Backend,
}

/// Errors from provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("authentication failed (check API key): {0}")]
    Auth(String),

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("backend error: {status}: {message}")]
    Backend { status: u16, message: String },

    /// The backend reported a failure after the stream had started.
    #[error("stream aborted by backend: {0}")]
    Stream(String),

    #[error("inference process failed (exit code {code:?}): {stderr}")]
    Process { code: Option<i32>, stderr: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Configuration(_)
            | ProviderError::UnsupportedBackend(_)
            | ProviderError::ModelNotFound(_) => ErrorKind::Configuration,
            _ => ErrorKind::Backend,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

/// Core trait for LLM backends.
///
/// Implementations must be `Send + Sync` so one instance can serve
/// concurrent calls behind an `Arc`. Methods return [`BoxFuture`] to keep
/// the trait object-safe.
pub trait Provider: Send + Sync {
    /// Backend identifier (e.g. "openai", "gguf").
    fn name(&self) -> &str;

    /// Whether the stored configuration is sufficient to attempt a call.
    fn is_configured(&self) -> bool;

    /// Models the backend offers.
    ///
    /// Never fails: on any error the implementation logs a warning and
    /// returns its fallback list.
    fn list_models(&self) -> BoxFuture<'_, Vec<String>>;

    /// Send the conversation and wait for the whole reply.
    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;

    /// Send the conversation and return the reply as it is generated.
    ///
    /// The future resolves once the backend has accepted the request; text
    /// is only read as the returned stream is polled.
    fn stream<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
    ) -> BoxFuture<'a, Result<TextStream, ProviderError>>;
}
