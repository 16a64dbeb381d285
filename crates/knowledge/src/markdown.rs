//! Markdown ingestion.
//!
//! Markdown is first rendered into a word-processing document in a scratch
//! directory and then read back through the docx reader, so headings, lists
//! and tables come out as the same paragraph text a `.docx` source would give.

use crate::error::IngestionError;
use crate::parser;
use crate::types::TextBlock;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use quick_xml::escape::escape;
use std::io::Write;
use std::path::Path;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// A rendered paragraph, optionally a heading of the given level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Paragraph {
    pub text: String,
    pub heading: Option<usize>,
}

/// Flatten markdown into paragraphs.
pub(crate) fn markdown_paragraphs(source: &str) -> Vec<Paragraph> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut heading = None;

    let mut flush = |current: &mut String, heading: &mut Option<usize>| {
        let text = current.trim().to_string();
        if !text.is_empty() {
            paragraphs.push(Paragraph {
                text,
                heading: heading.take(),
            });
        }
        current.clear();
        *heading = None;
    };

    for event in Parser::new_ext(source, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush(&mut current, &mut heading);
                heading = Some(level as usize);
            }
            Event::Start(Tag::Item) | Event::Start(Tag::CodeBlock(_)) => {
                flush(&mut current, &mut heading);
            }
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::TableHead)
            | Event::End(TagEnd::TableRow) => flush(&mut current, &mut heading),
            Event::End(TagEnd::TableCell) => current.push('\t'),
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak => current.push(' '),
            Event::HardBreak => current.push('\n'),
            _ => {}
        }
    }
    flush(&mut current, &mut heading);

    paragraphs
}

fn document_xml(paragraphs: &[Paragraph]) -> String {
    let mut body = String::new();
    for paragraph in paragraphs {
        body.push_str("<w:p>");
        if let Some(level) = paragraph.heading {
            body.push_str(&format!(
                r#"<w:pPr><w:pStyle w:val="Heading{}"/></w:pPr>"#,
                level
            ));
        }
        body.push_str("<w:r>");
        for (i, line) in paragraph.text.split('\n').enumerate() {
            if i > 0 {
                body.push_str("<w:br/>");
            }
            for (j, cell) in line.split('\t').enumerate() {
                if j > 0 {
                    body.push_str("<w:tab/>");
                }
                if !cell.is_empty() {
                    body.push_str(r#"<w:t xml:space="preserve">"#);
                    body.push_str(&escape(cell));
                    body.push_str("</w:t>");
                }
            }
        }
        body.push_str("</w:r></w:p>");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// Write paragraphs out as a minimal docx package.
pub(crate) fn write_docx(paragraphs: &[Paragraph], target: &Path) -> Result<(), String> {
    let file = std::fs::File::create(target).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", RELS_XML.to_string()),
        ("word/document.xml", document_xml(paragraphs)),
    ];
    for (name, content) in parts {
        zip.start_file(name, options).map_err(|e| e.to_string())?;
        zip.write_all(content.as_bytes())
            .map_err(|e| e.to_string())?;
    }

    zip.finish().map_err(|e| e.to_string())?;
    Ok(())
}

/// Read a markdown file by converting it to docx inside `scratch_dir`.
pub fn parse_markdown(path: &Path, scratch_dir: &Path) -> Result<Vec<TextBlock>, IngestionError> {
    let source = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::InvalidData => IngestionError::extraction(path, "not valid UTF-8"),
        _ => IngestionError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let converted = scratch_dir.join(format!(
        "{}-{}.docx",
        stem,
        scratch_dir.read_dir().map(|d| d.count()).unwrap_or(0)
    ));

    write_docx(&markdown_paragraphs(&source), &converted)
        .map_err(|e| IngestionError::extraction(path, format!("markdown conversion failed: {}", e)))?;
    tracing::debug!(source = ?path, converted = ?converted, "Converted markdown to docx");

    parser::parse_docx(&converted).map_err(|e| match e {
        IngestionError::Extraction { message, .. } => IngestionError::extraction(path, message),
        other => other,
    })
}
