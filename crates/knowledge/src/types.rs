//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source document formats understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Txt,
    Md,
    Pdf,
    Docx,
    Csv,
}

impl DocumentFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Md),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Csv => "csv",
        }
    }
}

/// A unit of extracted text: a whole file, a PDF page or a CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,

    /// Zero-based page, row or block index within the source file
    pub position: usize,
}

/// A loaded source file, discarded once chunked.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub blocks: Vec<TextBlock>,
}

/// A bounded span of source text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequential id scoped to one ingestion run, e.g. `Doc-0`
    pub id: String,

    pub text: String,

    /// Character offset of `text` within its originating block
    pub start_offset: usize,

    pub source_path: PathBuf,
}
