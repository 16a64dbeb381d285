//! Format-specific text extraction.
//!
//! Each reader turns one file into text blocks:
//! - txt: one block for the whole file
//! - pdf: one block per page
//! - docx: one block for the whole document, paragraphs separated by blank lines
//! - csv: one block per row, as `header: value` lines

use crate::error::IngestionError;
use crate::types::TextBlock;
use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

fn read_bytes(path: &Path) -> Result<Vec<u8>, IngestionError> {
    std::fs::read(path).map_err(|source| IngestionError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Keep only blocks with visible text, renumbering positions.
fn non_blank_blocks(texts: impl IntoIterator<Item = String>) -> Vec<TextBlock> {
    texts
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(position, text)| TextBlock { text, position })
        .collect()
}

/// Read a UTF-8 text file (a leading BOM is dropped).
pub fn parse_text(path: &Path) -> Result<Vec<TextBlock>, IngestionError> {
    let bytes = read_bytes(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| IngestionError::extraction(path, format!("not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text).to_string();
    Ok(non_blank_blocks([text]))
}

/// Read a PDF, one block per page.
pub fn parse_pdf(path: &Path) -> Result<Vec<TextBlock>, IngestionError> {
    let bytes = read_bytes(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| IngestionError::extraction(path, e))?;
    Ok(non_blank_blocks(pages))
}

/// Read a Word document from disk.
pub fn parse_docx(path: &Path) -> Result<Vec<TextBlock>, IngestionError> {
    let bytes = read_bytes(path)?;
    let paragraphs = docx_paragraphs(&bytes).map_err(|e| IngestionError::extraction(path, e))?;
    Ok(non_blank_blocks([paragraphs.join("\n\n")]))
}

/// Extract the paragraphs of `word/document.xml` from a docx archive.
pub(crate) fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    paragraphs_from_document_xml(&xml)
}

fn paragraphs_from_document_xml(xml: &[u8]) -> Result<Vec<String>, String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim_end().to_string();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph);
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(text)) if in_text => {
                let text = text.unescape().map_err(|e| e.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    let trailing = current.trim_end();
    if !trailing.is_empty() {
        paragraphs.push(trailing.to_string());
    }

    Ok(paragraphs)
}

/// Read a CSV file with a header row, one block per data row.
pub fn parse_csv(path: &Path) -> Result<Vec<TextBlock>, IngestionError> {
    let bytes = read_bytes(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes.as_slice());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestionError::extraction(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestionError::extraction(path, e))?;
        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let header = headers
                    .get(i)
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i + 1));
                format!("{}: {}", header, value.trim())
            })
            .collect();
        rows.push(lines.join("\n"));
    }

    Ok(non_blank_blocks(rows))
}
