//! LMDeploy `api_server` dialect.
//!
//! Requests use the OpenAI shape. Stream records come either in the OpenAI
//! `choices[0].delta.content` form or with a top-level `delta.content`,
//! depending on the server version.

use serde::Deserialize;

use super::decode::{Chunk, Framing};
use super::openai::{Delta, StreamChoice};

pub(crate) use super::openai::build_request;

pub(crate) const FRAMING: Framing = Framing::event_stream(Some("[DONE]"), parse_chunk);

#[derive(Debug, Deserialize)]
struct StreamRecord {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

pub(crate) fn parse_chunk(payload: &str) -> Result<Chunk, serde_json::Error> {
    let record: StreamRecord = serde_json::from_str(payload)?;
    let text = record
        .delta
        .and_then(|d| d.content)
        .or_else(|| record.choices.into_iter().next().and_then(|c| c.delta.content));
    Ok(text.map(Chunk::text).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct CompletionRecord {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<Delta>,
    #[serde(default)]
    text: Option<String>,
}

/// First choice's message content, or a bare `text` field.
pub(crate) fn parse_completion(body: &str) -> Result<String, serde_json::Error> {
    let record: CompletionRecord = serde_json::from_str(body)?;
    let text = record
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.and_then(|m| m.content).or(c.text))
        .or(record.text);
    Ok(text.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Option<Vec<String>>,
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Accepts `{"models": [..]}` as well as the OpenAI `{"data": [{"id"}]}` list.
pub(crate) fn parse_models(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let list: ModelList = serde_json::from_str(body)?;
    Ok(match list.models {
        Some(models) => models,
        None => list.data.into_iter().map(|m| m.id).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_chunk_both_shapes() {
        let top_level = parse_chunk(r#"{"delta":{"content":"a"}}"#).unwrap();
        assert_eq!(top_level.texts, vec!["a"]);

        let openai = parse_chunk(r#"{"choices":[{"index":0,"delta":{"content":"b"}}]}"#).unwrap();
        assert_eq!(openai.texts, vec!["b"]);

        let neither = parse_chunk(r#"{"usage":{"total_tokens":3}}"#).unwrap();
        assert!(neither.texts.is_empty());
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "ok");
        assert_eq!(parse_completion(r#"{"text":"raw"}"#).unwrap(), "raw");
        assert_eq!(parse_completion("{}").unwrap(), "");
    }

    #[test]
    fn test_parse_models_both_shapes() {
        assert_eq!(
            parse_models(r#"{"models":["internlm2","qwen"]}"#).unwrap(),
            vec!["internlm2", "qwen"]
        );
        assert_eq!(
            parse_models(r#"{"object":"list","data":[{"id":"internlm2"}]}"#).unwrap(),
            vec!["internlm2"]
        );
    }
}
