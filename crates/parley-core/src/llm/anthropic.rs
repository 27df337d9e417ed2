//! Anthropic Messages API dialect.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decode::{Chunk, Framing};
use super::types::{CallOptions, Message, Role};

pub(crate) const API_VERSION: &str = "2023-06-01";

/// The API rejects requests without `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// `data:` records with no marker; `message_stop` ends the stream.
pub(crate) const FRAMING: Framing = Framing::event_stream(None, parse_event);

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Shape the request.
///
/// The first system message moves to the top-level `system` field. The API
/// only accepts `user` and `assistant` in `messages`, so later system
/// messages are dropped.
pub(crate) fn build_request<'a>(
    model: &'a str,
    messages: &'a [Message],
    options: &'a CallOptions,
    stream: bool,
) -> MessagesRequest<'a> {
    let system = messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str());

    let extra_system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .count()
        .saturating_sub(1);
    if extra_system > 0 {
        debug!(dropped = extra_system, "anthropic accepts one system prompt, dropping the rest");
    }

    let wire = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => return None,
            };
            Some(WireMessage {
                role,
                content: &m.content,
            })
        })
        .collect();

    MessagesRequest {
        model,
        max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system,
        messages: wire,
        temperature: options.temperature,
        stop_sequences: &options.stop,
        stream,
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// Concatenated text blocks of the reply.
pub(crate) fn parse_completion(body: &str) -> Result<String, serde_json::Error> {
    let resp: MessagesResponse = serde_json::from_str(body)?;
    Ok(resp
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Event {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: EventDelta },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "error")]
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum EventDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

pub(crate) fn parse_event(payload: &str) -> Result<Chunk, serde_json::Error> {
    let chunk = match serde_json::from_str::<Event>(payload)? {
        Event::ContentBlockDelta {
            delta: EventDelta::TextDelta { text },
        } => Chunk::text(text),
        Event::MessageStop => Chunk::finished(),
        Event::Error { error } => Chunk::failed(format!("{}: {}", error.kind, error.message)),
        Event::ContentBlockDelta { .. } | Event::Other => Chunk::empty(),
    };
    Ok(chunk)
}
