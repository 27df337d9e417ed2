//! OpenAI Chat Completions dialect.
//!
//! Spoken by OpenAI itself and by OpenRouter, LM Studio, Groq and Mistral,
//! which differ only in base URL and model catalogue. LMDeploy reuses the
//! request shape from here.

use serde::{Deserialize, Serialize};

use super::decode::{Chunk, Framing};
use super::types::{CallOptions, Message};

/// `data:` records terminated by a literal `[DONE]`.
pub(crate) const FRAMING: Framing = Framing::event_stream(Some("[DONE]"), parse_chunk);

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Shape the request. System messages stay inline.
pub(crate) fn build_request<'a>(
    model: &'a str,
    messages: &'a [Message],
    options: &'a CallOptions,
    stream: bool,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        stop: &options.stop,
        stream,
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text of the first choice, or `""` when there is none.
pub(crate) fn parse_completion(body: &str) -> Result<String, serde_json::Error> {
    let resp: ChatResponse = serde_json::from_str(body)?;
    Ok(resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamResponse {
    #[serde(default)]
    pub(crate) choices: Vec<StreamChoice>,
    /// OpenRouter and some proxies report upstream failures in-band.
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub(crate) delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Delta {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

pub(crate) fn parse_chunk(payload: &str) -> Result<Chunk, serde_json::Error> {
    let resp: StreamResponse = serde_json::from_str(payload)?;
    if let Some(error) = resp.error {
        return Ok(Chunk::failed(error.message));
    }
    Ok(resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .map(Chunk::text)
        .unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Ids from a `GET /models` listing.
pub(crate) fn parse_models(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let list: ModelList = serde_json::from_str(body)?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::decode::StreamDecoder;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_build_simple_request() {
        let messages = [Message::system("Be terse."), Message::user("Hello!")];
        let options = CallOptions::new("gpt-4o")
            .with_temperature(0.7)
            .with_max_tokens(256)
            .with_stop(["END"]);
        let body = serde_json::to_value(build_request("gpt-4o", &messages, &options, true)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "Be terse."},
                    {"role": "user", "content": "Hello!"}
                ],
                "temperature": 0.7f32,
                "max_tokens": 256,
                "stop": ["END"],
                "stream": true
            })
        );
    }

    #[test]
    fn test_unset_options_are_omitted() {
        let messages = [Message::user("Hi")];
        let options = CallOptions::default();
        let body = serde_json::to_value(build_request("m", &messages, &options, false)).unwrap();
        let obj = body.as_object().unwrap();
        assert!(!obj.contains_key("temperature"));
        assert!(!obj.contains_key("max_tokens"));
        assert!(!obj.contains_key("stop"));
        assert_eq!(obj["stream"], json!(false));
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hi there"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Hi there");
        assert_eq!(parse_completion(r#"{"choices":[]}"#).unwrap(), "");
        assert!(parse_completion("not json").is_err());
    }

    #[test]
    fn test_three_chunk_stream() {
        let mut decoder = StreamDecoder::new(FRAMING);
        let mut out = Vec::new();
        for chunk in [
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
        ] {
            let step = decoder.feed(chunk.as_bytes());
            out.extend(step.increments);
            if step.done {
                break;
            }
        }
        assert!(decoder.is_done());
        assert!(decoder.finish().increments.is_empty());
        assert_eq!(out, vec!["Hel", "lo"]);
    }

    #[test]
    fn test_in_band_error_record() {
        let chunk = parse_chunk(r#"{"error":{"message":"upstream timeout","code":502}}"#).unwrap();
        assert_eq!(chunk, Chunk::failed("upstream timeout"));
    }

    #[test]
    fn test_role_only_delta_yields_nothing() {
        let chunk = parse_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(chunk, Chunk::empty());
    }

    #[test]
    fn test_parse_models() {
        let body = r#"{"object":"list","data":[{"id":"gpt-4o"},{"id":"whisper-1"}]}"#;
        assert_eq!(parse_models(body).unwrap(), vec!["gpt-4o", "whisper-1"]);
    }
}
