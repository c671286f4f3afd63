//! Transcript export rendering.
//!
//! A stored transcript renders on demand into TXT, DOCX, PDF, or HTML. TXT is
//! the transcript byte-for-byte; the document formats apply a fixed template
//! (title plus paragraphs split on blank lines) and stay lossless on the text
//! content itself.

pub mod docx;
pub mod html;
pub mod pdf;

use dashmap::DashMap;
use thiserror::Error;

/// Title line used by the document templates.
pub const DOCUMENT_TITLE: &str = "Transcription";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Error creating DOCX document: {0}")]
    Docx(String),
    #[error("Error creating PDF document: {0}")]
    Pdf(String),
}

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Raw transcript text
    Txt,
    /// Word document
    Docx,
    /// PDF document
    Pdf,
    /// Standalone HTML page
    Html,
}

impl ExportFormat {
    /// Parse format from a query token. Unknown tokens are an error at the
    /// API layer, never a silent fallback.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "txt" | "text" => Some(ExportFormat::Txt),
            "docx" => Some(ExportFormat::Docx),
            "pdf" => Some(ExportFormat::Pdf),
            "html" => Some(ExportFormat::Html),
            _ => None,
        }
    }

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Html => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain; charset=utf-8",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }
}

/// Render `text` into the requested format.
pub fn render(title: &str, text: &str, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Txt => Ok(text.as_bytes().to_vec()),
        ExportFormat::Html => Ok(html::render_html(title, text).into_bytes()),
        ExportFormat::Docx => docx::render_docx(title, text),
        ExportFormat::Pdf => pdf::render_pdf(title, text),
    }
}

/// Split transcript text into template paragraphs: blank-line separated,
/// trimmed, empties dropped. Shared by the document renderers.
pub(crate) fn paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Rendered-bytes cache keyed by job and format, validated by transcript
/// version. A `save` bumps the job's version, so stale entries can never be
/// served even before `invalidate` runs.
#[derive(Debug, Default)]
pub struct ExportCache {
    entries: DashMap<(String, ExportFormat), (u64, Vec<u8>)>,
}

impl ExportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str, format: ExportFormat, version: u64) -> Option<Vec<u8>> {
        self.entries
            .get(&(job_id.to_string(), format))
            .filter(|entry| entry.0 == version)
            .map(|entry| entry.1.clone())
    }

    pub fn insert(&self, job_id: &str, format: ExportFormat, version: u64, bytes: Vec<u8>) {
        self.entries
            .insert((job_id.to_string(), format), (version, bytes));
    }

    pub fn invalidate(&self, job_id: &str) {
        self.entries.retain(|(id, _), _| id != job_id);
    }
}
