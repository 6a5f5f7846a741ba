//! # runtime-llm
//!
//! Concrete [`runtime_core::LlmClient`] implementations: [`MockLlmClient`],
//! [`EchoLlmClient`], and [`RecordingLlmClient`] (deterministic, no
//! network, for tests and demos) and [`OpenAiCompatibleClient`] (HTTP, any
//! OpenAI-compatible `/chat/completions` endpoint).
//!
//! Grounded on the teacher's provider-implementor shape (one struct per
//! backend, a crate-local error enum folded down to the narrow interface's
//! error type at the trait boundary) trimmed from a multi-provider
//! (Ollama/OpenAI/Gemini/Deepseek/...) surface to the two backends this
//! runtime actually needs.

pub mod config;
pub mod error;
pub mod mock;
pub mod openai_compatible;

pub use config::RemoteLlmConfig;
pub use error::ProviderError;
pub use mock::{EchoLlmClient, MockLlmClient, RecordingLlmClient, ScriptedTurn};
pub use openai_compatible::OpenAiCompatibleClient;
