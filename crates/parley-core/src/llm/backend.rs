//! The closed set of supported backends and their fixed properties.

use std::fmt;

/// Wire protocol family an HTTP backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// OpenAI Chat Completions, also used by OpenRouter, LM Studio, Groq and Mistral.
    OpenAi,
    Anthropic,
    Google,
    LmDeploy,
    Ollama,
    /// Not HTTP: a local inference binary.
    Process,
}

/// How the credential is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// No credential is sent.
    None,
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// The key goes in the named header as-is.
    Header(&'static str),
}

/// A supported backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    OpenAi,
    OpenRouter,
    LmStudio,
    Groq,
    Mistral,
    Anthropic,
    Google,
    LmDeploy,
    Ollama,
    Gguf,
}

const ALL: &[Backend] = &[
    Backend::OpenAi,
    Backend::OpenRouter,
    Backend::LmStudio,
    Backend::Groq,
    Backend::Mistral,
    Backend::Anthropic,
    Backend::Google,
    Backend::LmDeploy,
    Backend::Ollama,
    Backend::Gguf,
];

impl Backend {
    pub fn all() -> &'static [Backend] {
        ALL
    }

    /// Resolve a user-supplied name. Matching is trimmed and
    /// case-insensitive, and a few common aliases are accepted.
    pub fn from_name(name: &str) -> Option<Backend> {
        let backend = match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Backend::OpenAi,
            "openrouter" => Backend::OpenRouter,
            "lmstudio" => Backend::LmStudio,
            "groq" => Backend::Groq,
            "mistral" => Backend::Mistral,
            "anthropic" | "claude" => Backend::Anthropic,
            "google" | "gemini" | "googleai" => Backend::Google,
            "lmdeploy" => Backend::LmDeploy,
            "ollama" => Backend::Ollama,
            "gguf" | "llamacpp" => Backend::Gguf,
            _ => return None,
        };
        Some(backend)
    }

    /// Canonical identifier.
    pub fn name(self) -> &'static str {
        match self {
            Backend::OpenAi => "openai",
            Backend::OpenRouter => "openrouter",
            Backend::LmStudio => "lmstudio",
            Backend::Groq => "groq",
            Backend::Mistral => "mistral",
            Backend::Anthropic => "anthropic",
            Backend::Google => "google",
            Backend::LmDeploy => "lmdeploy",
            Backend::Ollama => "ollama",
            Backend::Gguf => "gguf",
        }
    }

    pub fn dialect(self) -> Dialect {
        match self {
            Backend::OpenAi
            | Backend::OpenRouter
            | Backend::LmStudio
            | Backend::Groq
            | Backend::Mistral => Dialect::OpenAi,
            Backend::Anthropic => Dialect::Anthropic,
            Backend::Google => Dialect::Google,
            Backend::LmDeploy => Dialect::LmDeploy,
            Backend::Ollama => Dialect::Ollama,
            Backend::Gguf => Dialect::Process,
        }
    }

    /// Base URL used when the configuration does not override it.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Backend::OpenAi => "https://api.openai.com/v1",
            Backend::OpenRouter => "https://openrouter.ai/api/v1",
            Backend::LmStudio => "http://localhost:1234/v1",
            Backend::Groq => "https://api.groq.com/openai/v1",
            Backend::Mistral => "https://api.mistral.ai/v1",
            Backend::Anthropic => "https://api.anthropic.com/v1",
            Backend::Google => "https://generativelanguage.googleapis.com/v1beta",
            Backend::LmDeploy => "http://localhost:23333/v1",
            Backend::Ollama => "http://localhost:11434",
            Backend::Gguf => "",
        }
    }

    /// Model used when the caller leaves `CallOptions::model` empty. The
    /// process backend has none; it falls back to the first discovered model.
    pub fn default_model(self) -> &'static str {
        match self {
            Backend::OpenAi => "gpt-4o",
            Backend::OpenRouter => "openai/gpt-4o",
            Backend::LmStudio => "local-model",
            Backend::Groq => "llama3-70b-8192",
            Backend::Mistral => "mistral-large-latest",
            Backend::Anthropic => "claude-3-opus-20240229",
            Backend::Google => "gemini-1.5-pro",
            Backend::LmDeploy => "internlm2",
            Backend::Ollama => "llama3",
            Backend::Gguf => "",
        }
    }

    /// Whether a credential is mandatory.
    pub fn requires_credential(self) -> bool {
        matches!(
            self,
            Backend::OpenAi
                | Backend::OpenRouter
                | Backend::Groq
                | Backend::Mistral
                | Backend::Anthropic
                | Backend::Google
        )
    }

    pub fn auth_style(self) -> AuthStyle {
        match self {
            Backend::Anthropic => AuthStyle::Header("x-api-key"),
            Backend::Google => AuthStyle::Header("x-goog-api-key"),
            Backend::Ollama | Backend::Gguf => AuthStyle::None,
            _ => AuthStyle::Bearer,
        }
    }

    /// Substring a listed model id must contain to be offered, if any.
    pub(crate) fn model_filter(self) -> Option<&'static str> {
        match self {
            Backend::OpenAi => Some("gpt"),
            Backend::Google => Some("gemini"),
            _ => None,
        }
    }

    /// Curated list returned when the backend cannot be asked.
    pub fn fallback_models(self) -> &'static [&'static str] {
        match self {
            Backend::OpenAi => &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"],
            Backend::OpenRouter => &[
                "openai/gpt-4o",
                "anthropic/claude-3-opus",
                "meta-llama/llama-3-70b-instruct",
            ],
            Backend::LmStudio => &["local-model"],
            Backend::Groq => &[
                "llama3-70b-8192",
                "llama3-8b-8192",
                "mixtral-8x7b-32768",
                "gemma-7b-it",
            ],
            Backend::Mistral => &[
                "mistral-large-latest",
                "mistral-medium-latest",
                "mistral-small-latest",
                "open-mixtral-8x7b",
            ],
            Backend::Anthropic => &[
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
            ],
            Backend::Google => &["gemini-1.5-pro", "gemini-1.5-flash", "gemini-pro"],
            Backend::LmDeploy => &["internlm2"],
            Backend::Ollama => &["llama3", "mistral", "codellama"],
            Backend::Gguf => &[],
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
