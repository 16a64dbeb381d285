//! Embedding backends.
//!
//! Every backend implements [`EmbeddingProvider`]; [`create_provider`] maps a
//! provider name to an implementation.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
