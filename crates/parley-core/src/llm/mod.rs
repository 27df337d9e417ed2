//! LLM provider integration: one contract, many backends.
//!
//! Every backend implements [`Provider`]. The [`Registry`] turns a backend
//! name plus a [`ProviderConfig`](parley_config::ProviderConfig) into a
//! validated `Box<dyn Provider>`.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────┐
//!   name, config ─▶│ Registry │
//!                 └────┬─────┘
//!                      ▼
//!               ┌─────────────┐   preprocess (context prompt, flags)
//!               │  Provider   │◀──────────────────────────────────
//!               └──────┬──────┘
//!            ┌─────────┴──────────┐
//!            ▼                    ▼
//!     ┌──────────────┐     ┌─────────────────┐
//!     │ HttpProvider │     │ ProcessProvider │
//!     │  + dialects  │     │  (llama.cpp)    │
//!     └──────┬───────┘     └────────┬────────┘
//!            ▼                      ▼
//!      decode_stream          word splitter
//! ```
//!
//! Dialects: OpenAI (also OpenRouter, LM Studio, Groq, Mistral), Anthropic,
//! Google, LMDeploy and Ollama.

mod anthropic;
pub mod backend;
pub mod decode;
mod google;
pub mod http;
mod lmdeploy;
mod ollama;
mod openai;
pub mod preprocess;
pub mod process;
pub mod provider;
pub mod registry;
pub mod types;

pub use backend::{AuthStyle, Backend, Dialect};
pub use decode::{Chunk, Framing, LineBuffer, Step, StreamDecoder, Utf8Decoder, decode_stream};
pub use http::HttpProvider;
pub use preprocess::apply_options;
pub use process::{ProcessProvider, ProcessSource, WordSplitter, format_prompt};
pub use provider::{ErrorKind, Provider, ProviderError, TextStream};
pub use registry::Registry;
pub use types::*;
