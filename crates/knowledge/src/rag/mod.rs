//! Conversational retrieval-augmented answering.
//!
//! A question flows through the pipeline as:
//! history snapshot → standalone rewrite → MMR retrieval → grounded answer →
//! reasoning split → history append.

pub mod answer;
pub mod backends;
pub mod contextualize;
pub mod history;
pub mod pipeline;
pub mod postprocess;
pub mod settings;
pub mod types;

pub use answer::{AnswerGenerator, AnswerPersona};
pub use backends::{BackendFactory, ProviderRegistry};
pub use contextualize::QueryContextualizer;
pub use history::{Message, MessageRole, SessionHistoryStore, DEFAULT_HISTORY_CAP};
pub use pipeline::ConversationPipeline;
pub use postprocess::split;
pub use settings::{
    ConfigSource, FileConfigSource, PipelineSettings, ProviderAccess, StaticConfigSource,
};
pub use types::{AnswerResult, PipelineStatus, SourceRef};

use unichat_core::AppError;

/// Any failure inside a model call during `ask` is a generation failure.
pub(crate) fn generation_error(err: AppError) -> AppError {
    match err {
        AppError::Generation(_) => err,
        other => AppError::Generation(other.to_string()),
    }
}
