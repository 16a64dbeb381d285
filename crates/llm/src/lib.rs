//! LLM integration crate for Unichat.
//!
//! This crate provides a provider-agnostic chat-completion abstraction.
//! Every provider implements [`LlmClient`]; [`create_client`] is the registry
//! that maps a provider name to an implementation.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default), native `/api/chat`
//! - **OpenAI-compatible**: OpenAI, DeepSeek, Moonshot, ZhipuAI, DashScope, Baichuan
//!
//! # Example
//! ```no_run
//! use unichat_llm::{ChatMessage, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("qwen2.5", vec![ChatMessage::user("Hello, world!")]);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatibleClient};
pub use types::ProviderType;
