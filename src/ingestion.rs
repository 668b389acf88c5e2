use log::debug;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::error::{AnalyzerError, Result};
use crate::schema::DocumentSource;

/// Turns a document's bytes into plain text.
pub trait TextExtractor {
    fn extract_text(&self, source: &DocumentSource) -> Result<String>;
}

/// Text extraction backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, source: &DocumentSource) -> Result<String> {
        // pdf-extract panics on some malformed files; keep that local to the document.
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(&source.content)
        }))
        .map_err(|_| {
            AnalyzerError::PdfExtraction(format!("parser aborted while reading {}", source.name))
        })?;

        let text = extracted.map_err(|e| AnalyzerError::PdfExtraction(e.to_string()))?;
        debug!("Extracted {} characters from {}", text.chars().count(), source.name);
        Ok(text)
    }
}

/// Reads a file from disk into a `DocumentSource` named after the file.
pub fn read_document(path: &Path) -> Result<DocumentSource> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            AnalyzerError::InvalidConfig(format!("Invalid file name: {}", path.display()))
        })?
        .to_string();
    let content = std::fs::read(path)?;
    Ok(DocumentSource::new(name, content))
}
