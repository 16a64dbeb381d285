//! Conversation pipeline result and state types.

use crate::types::Chunk;
use serde::{Deserialize, Serialize};

/// Maximum snippet length for source references, in characters.
const MAX_SNIPPET_LENGTH: usize = 150;

const REASONING_BEGIN: &str = "<<<<<< Reasoning begins >>>>>>";
const REASONING_END: &str = "<<<<<< Reasoning complete >>>>>>";

/// Where a retrieved chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source file name (e.g., "handbook.pdf")
    pub source: String,

    pub chunk_id: String,

    /// Character offset of the chunk within its page, row or file
    pub start_offset: usize,

    /// Leading part of the chunk text
    pub snippet: String,
}

impl From<&Chunk> for SourceRef {
    fn from(chunk: &Chunk) -> Self {
        let source = chunk
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| chunk.source_path.display().to_string());

        let snippet = if chunk.text.chars().count() > MAX_SNIPPET_LENGTH {
            let cut: String = chunk.text.chars().take(MAX_SNIPPET_LENGTH).collect();
            format!("{}...", cut.trim_end())
        } else {
            chunk.text.clone()
        };

        Self {
            source,
            chunk_id: chunk.id.clone(),
            start_offset: chunk.start_offset,
            snippet,
        }
    }
}

/// Outcome of one `ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    /// User-facing answer, with any reasoning removed
    pub answer: String,

    /// Reasoning trace, empty when the model emitted none
    pub reasoning: String,

    /// The question as sent to retrieval and generation
    #[serde(rename = "standaloneQuestion")]
    pub standalone_question: String,

    pub sources: Vec<SourceRef>,
}

impl AnswerResult {
    /// Answer text for display, reasoning framed by banners when present.
    pub fn display(&self) -> String {
        if self.reasoning.is_empty() {
            return self.answer.clone();
        }
        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            REASONING_BEGIN, self.reasoning, REASONING_END, self.answer
        )
    }
}

/// Lifecycle state of a conversation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Uninitialized,
    Ready,
    Reconfiguring,
    Stopped,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Reconfiguring => "reconfiguring",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
