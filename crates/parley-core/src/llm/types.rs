//! Common types shared by every backend.

use serde::{Deserialize, Serialize};

/// Who said a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// The lowercase wire name used by OpenAI-style APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation. Order in a slice is conversation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-call options.
///
/// Fields the adapters do not recognize are kept in [`extra`](Self::extra)
/// and merged into the request body untouched, for backend-specific tuning
/// such as `top_p` or `seed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Model identifier. Empty means the backend's default model.
    #[serde(default)]
    pub model: String,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Text merged into (or inserted as) the leading system message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_prompt: Option<String>,

    /// Ask the model to lean on attached documentation.
    #[serde(default)]
    pub use_docs: bool,

    /// Ask for code-focused, terse answers.
    #[serde(default)]
    pub coder_mode: bool,

    /// Allow the model to role-play several collaborating experts.
    #[serde(default)]
    pub multi_agent: bool,

    /// Unrecognized fields, passed through to the backend.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CallOptions {
    /// Options for `model` with everything else unset.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.context_prompt = Some(prompt.into());
        self
    }

    pub fn with_use_docs(mut self, enabled: bool) -> Self {
        self.use_docs = enabled;
        self
    }

    pub fn with_coder_mode(mut self, enabled: bool) -> Self {
        self.coder_mode = enabled;
        self
    }

    pub fn with_multi_agent(mut self, enabled: bool) -> Self {
        self.multi_agent = enabled;
        self
    }

    /// Add a pass-through field.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The requested model, or `default` when none was given.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        let model = self.model.trim();
        if model.is_empty() { default } else { model }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::assistant("hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_options_capture_unknown_fields() {
        let options: CallOptions = serde_json::from_value(json!({
            "model": "gpt-4o",
            "temperature": 0.2,
            "coder_mode": true,
            "top_p": 0.9,
            "seed": 7
        }))
        .unwrap();
        assert_eq!(options.model, "gpt-4o");
        assert_eq!(options.temperature, Some(0.2));
        assert!(options.coder_mode);
        assert_eq!(options.extra.get("top_p"), Some(&json!(0.9)));
        assert_eq!(options.extra.get("seed"), Some(&json!(7)));
        assert!(!options.extra.contains_key("model"));
    }

    #[test]
    fn test_model_or_uses_default_for_blank() {
        assert_eq!(CallOptions::default().model_or("llama3"), "llama3");
        assert_eq!(CallOptions::new("  ").model_or("llama3"), "llama3");
        assert_eq!(CallOptions::new("phi3").model_or("llama3"), "phi3");
    }

    #[test]
    fn test_builder_sets_fields() {
        let options = CallOptions::new("m")
            .with_temperature(0.5)
            .with_max_tokens(64)
            .with_stop(["\n\n", "END"])
            .with_context_prompt("ctx")
            .with_extra("top_k", json!(40));
        assert_eq!(options.max_tokens, Some(64));
        assert_eq!(options.stop, vec!["\n\n".to_string(), "END".to_string()]);
        assert_eq!(options.context_prompt.as_deref(), Some("ctx"));
        assert_eq!(options.extra["top_k"], json!(40));
    }
}
