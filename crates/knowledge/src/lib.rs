//! Conversational retrieval over a local document set.
//!
//! Documents are loaded and chunked once per setup or restart, embedded into
//! an in-memory index, and queried through a [`ConversationPipeline`] that
//! keeps per-session chat history.

pub mod chunker;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod loader;
pub mod markdown;
pub mod parser;
pub mod rag;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::Chunker;
pub use error::IngestionError;
pub use index::{EmbeddingIndex, RetrievalOptions};
pub use loader::{remove_stale_documents, DocumentLoader, LoadReport};
pub use rag::{
    AnswerResult, BackendFactory, ConfigSource, ConversationPipeline, FileConfigSource,
    Message, MessageRole, PipelineSettings, PipelineStatus, ProviderAccess, ProviderRegistry,
    SourceRef, StaticConfigSource,
};
pub use types::{Chunk, DocumentFormat, SourceDocument, TextBlock};
