//! Shared HTTP transport for every remote backend.
//!
//! [`HttpProvider`] holds a `reqwest::Client`, pre-built auth headers and a
//! base URL, and delegates body shaping and parsing to the dialect modules.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use parley_config::ProviderConfig;

use crate::BoxFuture;

use super::backend::{AuthStyle, Backend, Dialect};
use super::decode::{Framing, decode_stream};
use super::preprocess::apply_options;
use super::provider::{Provider, ProviderError, TextStream};
use super::types::{CallOptions, Message};
use super::{anthropic, google, lmdeploy, ollama, openai};

/// Seconds to wait when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// A remote backend reached over HTTP.
pub struct HttpProvider {
    backend: Backend,
    client: Client,
    base_url: String,
    headers: HeaderMap,
    has_credential: bool,
}

impl HttpProvider {
    /// Build a provider for `backend` from its connection settings.
    ///
    /// Fails only if `backend` is not an HTTP backend or the credential
    /// cannot be carried in a header.
    pub fn new(
        backend: Backend,
        client: Client,
        config: &ProviderConfig,
    ) -> Result<Self, ProviderError> {
        if backend.dialect() == Dialect::Process {
            return Err(ProviderError::Configuration(format!(
                "{backend} is not an HTTP backend"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if backend == Backend::Anthropic {
            headers.insert(
                HeaderName::from_static("anthropic-version"),
                HeaderValue::from_static(anthropic::API_VERSION),
            );
        }

        let credential = config.credential();
        if let Some(key) = credential {
            let auth = match backend.auth_style() {
                AuthStyle::None => None,
                AuthStyle::Bearer => Some((
                    header::AUTHORIZATION,
                    format!("Bearer {}", key.expose().trim()),
                )),
                AuthStyle::Header(name) => {
                    Some((HeaderName::from_static(name), key.expose().trim().to_string()))
                }
            };
            if let Some((name, value)) = auth {
                let mut value = HeaderValue::from_str(&value).map_err(|_| {
                    ProviderError::Configuration(format!(
                        "{backend} API key contains characters not allowed in a header"
                    ))
                })?;
                value.set_sensitive(true);
                headers.insert(name, value);
            }
        }

        Ok(Self {
            backend,
            client,
            base_url: config.base_url_or(backend.default_base_url()).to_string(),
            headers,
            has_credential: credential.is_some(),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn chat_path(&self, model: &str, stream: bool) -> String {
        match self.backend.dialect() {
            Dialect::OpenAi | Dialect::LmDeploy => "/chat/completions".to_string(),
            Dialect::Anthropic => "/messages".to_string(),
            Dialect::Google => google::endpoint(model, stream),
            Dialect::Ollama => "/api/chat".to_string(),
            Dialect::Process => String::new(),
        }
    }

    fn models_path(&self) -> Option<&'static str> {
        match self.backend.dialect() {
            Dialect::OpenAi | Dialect::LmDeploy | Dialect::Google => Some("/models"),
            Dialect::Ollama => Some("/api/tags"),
            Dialect::Anthropic | Dialect::Process => None,
        }
    }

    fn framing(&self) -> Framing {
        match self.backend.dialect() {
            Dialect::Anthropic => anthropic::FRAMING,
            Dialect::Google => google::FRAMING,
            Dialect::LmDeploy => lmdeploy::FRAMING,
            Dialect::Ollama => ollama::FRAMING,
            Dialect::OpenAi | Dialect::Process => openai::FRAMING,
        }
    }

    /// Preprocess the conversation and shape the dialect's request body.
    ///
    /// Returns the resolved model alongside the body.
    pub fn build_request_body(
        &self,
        messages: &[Message],
        options: &CallOptions,
        stream: bool,
    ) -> Result<(String, Value), ProviderError> {
        let prepared = apply_options(messages, options);
        let model = options.model_or(self.backend.default_model()).to_string();

        let mut body = match self.backend.dialect() {
            Dialect::OpenAi | Dialect::Process => {
                serde_json::to_value(openai::build_request(&model, &prepared, options, stream))?
            }
            Dialect::LmDeploy => {
                serde_json::to_value(lmdeploy::build_request(&model, &prepared, options, stream))?
            }
            Dialect::Anthropic => serde_json::to_value(anthropic::build_request(
                &model, &prepared, options, stream,
            ))?,
            Dialect::Google => serde_json::to_value(google::build_request(&prepared, options))?,
            Dialect::Ollama => {
                serde_json::to_value(ollama::build_request(&model, &prepared, options, stream))?
            }
        };
        merge_extra(&mut body, &options.extra);
        Ok((model, body))
    }

    fn parse_completion(&self, body: &str) -> Result<String, serde_json::Error> {
        match self.backend.dialect() {
            Dialect::Anthropic => anthropic::parse_completion(body),
            Dialect::Google => google::parse_completion(body),
            Dialect::LmDeploy => lmdeploy::parse_completion(body),
            Dialect::Ollama => ollama::parse_completion(body),
            Dialect::OpenAi | Dialect::Process => openai::parse_completion(body),
        }
    }

    fn ensure_configured(&self) -> Result<(), ProviderError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ProviderError::Configuration(format!(
                "{} requires an API key",
                self.backend
            )))
        }
    }

    async fn send_chat(
        &self,
        messages: &[Message],
        options: &CallOptions,
        stream: bool,
    ) -> Result<Response, ProviderError> {
        self.ensure_configured()?;
        let (model, body) = self.build_request_body(messages, options, stream)?;
        let url = self.url(&self.chat_path(&model, stream));

        debug!(backend = %self.backend, model = %model, stream, "sending chat request");
        trace!(body = %body, "request body");

        let resp = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        check_status(resp).await
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ProviderError> {
        let Some(path) = self.models_path() else {
            return Ok(self.fallback_models());
        };
        self.ensure_configured()?;

        let resp = self
            .client
            .get(self.url(path))
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let body = check_status(resp)
            .await?
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let mut models = match self.backend.dialect() {
            Dialect::Google => google::parse_models(&body)?,
            Dialect::Ollama => ollama::parse_models(&body)?,
            Dialect::LmDeploy => lmdeploy::parse_models(&body)?,
            _ => openai::parse_models(&body)?,
        };
        if let Some(filter) = self.backend.model_filter() {
            models.retain(|id| id.contains(filter));
        }
        Ok(models)
    }

    fn fallback_models(&self) -> Vec<String> {
        self.backend
            .fallback_models()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Map non-success statuses to errors.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    let message = resp
        .text()
        .await
        .unwrap_or_else(|e| format!("<body unavailable: {e}>"));
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::Auth(message));
    }
    Err(ProviderError::Backend {
        status: status.as_u16(),
        message,
    })
}

/// Copy pass-through fields into the top level of `body`, keeping anything
/// the dialect already set.
pub(crate) fn merge_extra(body: &mut Value, extra: &Map<String, Value>) {
    if let Value::Object(obj) = body {
        for (key, value) in extra {
            obj.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

impl Provider for HttpProvider {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn is_configured(&self) -> bool {
        !self.backend.requires_credential() || self.has_credential
    }

    fn list_models(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            match self.fetch_models().await {
                Ok(models) if !models.is_empty() => models,
                Ok(_) => {
                    warn!(backend = %self.backend, "backend listed no models, using fallback list");
                    self.fallback_models()
                }
                Err(err) => {
                    warn!(backend = %self.backend, error = %err, "model listing failed, using fallback list");
                    self.fallback_models()
                }
            }
        })
    }

    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let resp = self.send_chat(messages, options, false).await?;
            let body = resp
                .text()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;
            trace!(body = %body, "response body");
            self.parse_completion(&body)
                .map_err(|e| ProviderError::Parse(e.to_string()))
        })
    }

    fn stream<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
    ) -> BoxFuture<'a, Result<TextStream, ProviderError>> {
        Box::pin(async move {
            let resp = self.send_chat(messages, options, true).await?;
            Ok(decode_stream(resp.bytes_stream(), self.framing()))
        })
    }
}
