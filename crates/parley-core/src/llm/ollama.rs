//! Ollama native chat API (`/api/chat`).

use serde::{Deserialize, Serialize};

use super::decode::{Chunk, Framing};
use super::types::{CallOptions, Message};

/// One bare JSON object per line; `"done": true` ends the stream.
pub(crate) const FRAMING: Framing = Framing::json_lines(parse_chunk);

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ModelOptions<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ModelOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

pub(crate) fn build_request<'a>(
    model: &'a str,
    messages: &'a [Message],
    options: &'a CallOptions,
    stream: bool,
) -> ChatRequest<'a> {
    let has_options =
        options.temperature.is_some() || options.max_tokens.is_some() || !options.stop.is_empty();
    ChatRequest {
        model,
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
        stream,
        options: has_options.then(|| ModelOptions {
            temperature: options.temperature,
            num_predict: options.max_tokens,
            stop: &options.stop,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    /// `/api/generate` shape, accepted for proxies that rewrite the route.
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl ChatResponse {
    fn into_text(self) -> Option<String> {
        self.message.map(|m| m.content).or(self.response)
    }
}

pub(crate) fn parse_completion(body: &str) -> Result<String, serde_json::Error> {
    let resp: ChatResponse = serde_json::from_str(body)?;
    Ok(resp.into_text().unwrap_or_default())
}

pub(crate) fn parse_chunk(payload: &str) -> Result<Chunk, serde_json::Error> {
    let resp: ChatResponse = serde_json::from_str(payload)?;
    if let Some(error) = resp.error {
        return Ok(Chunk::failed(error));
    }
    let done = resp.done;
    Ok(Chunk {
        texts: resp.into_text().into_iter().collect(),
        finished: done,
        failure: None,
    })
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// Names from `GET /api/tags`.
pub(crate) fn parse_models(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let tags: TagList = serde_json::from_str(body)?;
    Ok(tags.models.into_iter().map(|t| t.name).collect())
}
