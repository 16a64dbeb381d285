//! Document loading.
//!
//! Resolves configured filenames against the documents directory and
//! dispatches each file to its format reader. Per-file failures are logged
//! and the file is skipped; the caller decides whether what is left is enough.

use crate::error::IngestionError;
use crate::markdown;
use crate::parser;
use crate::types::{DocumentFormat, SourceDocument};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use unichat_core::AppResult;

/// Outcome of one loading run.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully loaded documents, in input order
    pub documents: Vec<SourceDocument>,

    /// Files that were skipped and why
    pub skipped: Vec<(String, IngestionError)>,
}

impl LoadReport {
    pub fn block_count(&self) -> usize {
        self.documents.iter().map(|d| d.blocks.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    base_dir: PathBuf,
}

impl DocumentLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Load every named file relative to the base directory.
    ///
    /// Markdown conversion uses a fresh scratch directory owned by this call,
    /// removed when the call returns.
    pub fn load(&self, filenames: &[String]) -> AppResult<LoadReport> {
        let scratch = tempfile::Builder::new().prefix("unichat-md-").tempdir()?;
        let mut report = LoadReport::default();

        for name in filenames {
            match self.load_file(name, scratch.path()) {
                Ok(document) => {
                    tracing::debug!(
                        file = %name,
                        format = document.format.as_str(),
                        blocks = document.blocks.len(),
                        "Loaded document"
                    );
                    report.documents.push(document);
                }
                Err(e) => {
                    tracing::warn!(file = %name, "Skipping document: {}", e);
                    report.skipped.push((name.clone(), e));
                }
            }
        }

        tracing::info!(
            loaded = report.documents.len(),
            skipped = report.skipped.len(),
            blocks = report.block_count(),
            "Document loading finished"
        );

        Ok(report)
    }

    fn load_file(&self, name: &str, scratch_dir: &Path) -> Result<SourceDocument, IngestionError> {
        let path = self.base_dir.join(name);
        if !path.is_file() {
            return Err(IngestionError::Missing(path));
        }

        let format = DocumentFormat::from_path(&path)
            .ok_or_else(|| IngestionError::UnsupportedFormat(path.clone()))?;

        let blocks = match format {
            DocumentFormat::Txt => parser::parse_text(&path)?,
            DocumentFormat::Md => markdown::parse_markdown(&path, scratch_dir)?,
            DocumentFormat::Pdf => parser::parse_pdf(&path)?,
            DocumentFormat::Docx => parser::parse_docx(&path)?,
            DocumentFormat::Csv => parser::parse_csv(&path)?,
        };

        if blocks.is_empty() {
            return Err(IngestionError::EmptyExtraction(path));
        }

        Ok(SourceDocument {
            path,
            format,
            blocks,
        })
    }
}

/// Delete regular files in `dir` whose names are not listed in `keep`.
///
/// Returns the removed paths. Subdirectories are left alone and a missing
/// directory removes nothing.
pub fn remove_stale_documents(dir: &Path, keep: &[String]) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::debug!(dir = ?dir, "Documents directory does not exist, nothing to clean");
        return Ok(Vec::new());
    }

    let keep: HashSet<&str> = keep.iter().map(|s| s.as_str()).collect();
    let mut removed = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if keep.contains(name.as_ref()) {
            continue;
        }

        let path = entry.path();
        fs::remove_file(&path)?;
        tracing::info!(path = ?path, "Removed stale document");
        removed.push(path);
    }

    removed.sort();
    Ok(removed)
}
