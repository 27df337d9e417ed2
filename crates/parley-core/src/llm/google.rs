//! Google Generative Language (Gemini) dialect.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decode::{Chunk, Framing};
use super::types::{CallOptions, Message, Role};

/// `streamGenerateContent?alt=sse` sends `data:` records and simply closes.
pub(crate) const FRAMING: Framing = Framing::event_stream(None, parse_chunk);

pub(crate) fn endpoint(model: &str, stream: bool) -> String {
    if stream {
        format!("/models/{model}:streamGenerateContent?alt=sse")
    } else {
        format!("/models/{model}:generateContent")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
}

/// Shape the request. The model travels in the URL, not the body.
///
/// Only the first system message becomes `systemInstruction`; later ones
/// are dropped.
pub(crate) fn build_request<'a>(
    messages: &'a [Message],
    options: &'a CallOptions,
) -> GenerateRequest<'a> {
    let mut system = messages.iter().filter(|m| m.role == Role::System);
    let system_instruction = system.next().map(|m| SystemInstruction {
        parts: vec![Part { text: &m.content }],
    });
    let dropped = system.count();
    if dropped > 0 {
        debug!(dropped, "gemini accepts one system instruction, dropping the rest");
    }

    let contents = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => return None,
            };
            Some(Content {
                role,
                parts: vec![Part { text: &m.content }],
            })
        })
        .collect();

    let generation_config = (options.temperature.is_some()
        || options.max_tokens.is_some()
        || !options.stop.is_empty())
    .then(|| GenerationConfig {
        temperature: options.temperature,
        max_output_tokens: options.max_tokens,
        stop_sequences: &options.stop,
    });

    GenerateRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

fn first_candidate_text(resp: GenerateResponse) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default()
}

pub(crate) fn parse_completion(body: &str) -> Result<String, serde_json::Error> {
    Ok(first_candidate_text(serde_json::from_str(body)?))
}

pub(crate) fn parse_chunk(payload: &str) -> Result<Chunk, serde_json::Error> {
    let mut resp: GenerateResponse = serde_json::from_str(payload)?;
    if let Some(error) = resp.error.take() {
        return Ok(Chunk::failed(format!("{}: {}", error.status, error.message)));
    }
    Ok(Chunk::text(first_candidate_text(resp)))
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// Model ids with the `models/` resource prefix removed.
pub(crate) fn parse_models(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let list: ModelList = serde_json::from_str(body)?;
    Ok(list
        .models
        .into_iter()
        .map(|m| match m.name.strip_prefix("models/") {
            Some(id) => id.to_string(),
            None => m.name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_build_request_moves_system_and_renames_assistant() {
        let messages = [
            Message::system("Be brief."),
            Message::user("Hi"),
            Message::assistant("Hello"),
            Message::user("Bye"),
        ];
        let options = CallOptions::new("gemini-1.5-pro")
            .with_temperature(0.5)
            .with_max_tokens(100)
            .with_stop(["STOP"]);
        let body = serde_json::to_value(build_request(&messages, &options)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello"}]},
                    {"role": "user", "parts": [{"text": "Bye"}]}
                ],
                "systemInstruction": {"parts": [{"text": "Be brief."}]},
                "generationConfig": {
                    "temperature": 0.5,
                    "maxOutputTokens": 100,
                    "stopSequences": ["STOP"]
                }
            })
        );
    }

    #[test]
    fn test_later_system_messages_are_dropped() {
        let messages = [
            Message::system("first"),
            Message::user("q"),
            Message::system("second"),
        ];
        let body = serde_json::to_value(build_request(&messages, &CallOptions::default())).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "q"}]}],
                "systemInstruction": {"parts": [{"text": "first"}]}
            })
        );
    }

    #[test]
    fn test_error_record_fails_stream() {
        let chunk = parse_chunk(
            r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#,
        )
        .unwrap();
        assert_eq!(chunk, Chunk::failed("UNAVAILABLE: The model is overloaded."));
    }

    #[test]
    fn test_generation_config_omitted_when_unset() {
        let messages = [Message::user("Hi")];
        let body = serde_json::to_value(build_request(&messages, &CallOptions::default())).unwrap();
        assert_eq!(
            body,
            json!({"contents": [{"role": "user", "parts": [{"text": "Hi"}]}]})
        );
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(endpoint("gemini-pro", false), "/models/gemini-pro:generateContent");
        assert_eq!(
            endpoint("gemini-pro", true),
            "/models/gemini-pro:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_parse_completion_and_chunk() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Bon"},{"text":"jour"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Bonjour");
        assert_eq!(parse_chunk(body).unwrap().texts, vec!["Bonjour"]);
        assert_eq!(parse_completion(r#"{"promptFeedback":{}}"#).unwrap(), "");
    }

    #[test]
    fn test_parse_models_strips_prefix() {
        let body = r#"{"models":[{"name":"models/gemini-1.5-pro"},{"name":"models/embedding-001"}]}"#;
        assert_eq!(
            parse_models(body).unwrap(),
            vec!["gemini-1.5-pro", "embedding-001"]
        );
    }
}
