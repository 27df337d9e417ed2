#![deny(unsafe_code)]

//! Parley: one contract for many LLM backends.
//!
//! Send an ordered conversation to OpenAI-compatible services, Anthropic,
//! Google, Ollama, LMDeploy, or a local llama.cpp-style binary, and get back
//! either the whole reply or a lazy stream of text increments. See [`llm`]
//! for the provider contract and the registry.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

/// A type-erased, `Send`-safe, boxed future.
///
/// Native `async fn` in traits is not object-safe, so [`llm::Provider`]
/// returns this instead to stay usable as `Box<dyn Provider>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased, `Send`-safe, boxed stream.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Provider contract, decoders, adapters, and registry.
pub mod llm;

pub use llm::{
    Backend, CallOptions, ErrorKind, Message, Provider, ProviderError, Registry, Role, TextStream,
};
pub use parley_config::{Credential, ProcessConfig, ProviderConfig};
